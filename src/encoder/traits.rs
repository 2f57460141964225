//! Traits and types for rendering coubs

use crate::resolver::CoubAsset;
use async_trait::async_trait;
use std::path::Path;

/// How a coub's streams are combined into the output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPlan {
    /// Mux the audio track into the output
    pub attach_audio: bool,
    /// Number of times the video is played back to back (at least 1)
    pub loop_count: u32,
    /// Stop at the end of the shortest stream
    pub shortest: bool,
    /// Extra encoder arguments, appended before the output
    pub extra_options: Vec<String>,
}

impl RenderPlan {
    /// Plan for a single, unmodified playback of the video
    pub fn single_loop() -> Self {
        Self {
            attach_audio: false,
            loop_count: 1,
            shortest: false,
            extra_options: Vec::new(),
        }
    }

    /// Default plan for an asset
    ///
    /// With audio, the video loops `max_loop_count` times and the output is
    /// clamped to the shortest stream, which in practice is the audio track.
    /// Without audio, the video plays once.
    pub fn for_asset(asset: &CoubAsset, max_loop_count: u32) -> Self {
        if asset.has_audio() {
            Self::single_loop()
                .with_audio(true)
                .with_loop(max_loop_count)
                .with_shortest(true)
        } else {
            Self::single_loop()
        }
    }

    /// Set whether the audio track is attached
    pub fn with_audio(mut self, attach_audio: bool) -> Self {
        self.attach_audio = attach_audio;
        self
    }

    /// Set the loop count; values below 1 are raised to 1
    pub fn with_loop(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count.max(1);
        self
    }

    /// Set shortest-stream clamping
    pub fn with_shortest(mut self, shortest: bool) -> Self {
        self.shortest = shortest;
        self
    }

    /// Append one extra encoder argument
    pub fn add_option(mut self, option: impl Into<String>) -> Self {
        self.extra_options.push(option.into());
        self
    }
}

/// Trait for the external mux/encode step
///
/// Implementations must either leave a complete file at `dest` and return
/// `Ok`, or leave nothing at `dest` and return an error.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Render `asset` according to `plan` into `dest`
    ///
    /// # Errors
    ///
    /// Returns `Error::Transcode` if the encoder fails, or
    /// `Error::NotSupported` for stub implementations.
    async fn write(&self, asset: &CoubAsset, plan: &RenderPlan, dest: &Path) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
