//! Rendering coubs to local mp4 files
//!
//! This module provides a trait-based abstraction over the external muxer.
//! The download coordinator only talks to the [`Encoder`] trait, so tests can
//! substitute an in-process implementation.
//!
//! ## Architecture
//!
//! - [`FfmpegEncoder`]: runs an external `ffmpeg` binary
//! - [`NoOpEncoder`]: used when no ffmpeg is available; every write fails
//!   with `Error::NotSupported`, so each coub is reported as failed instead of
//!   the run aborting
//!
//! A [`RenderPlan`] describes what to do with the streams: how often the
//! video loops, whether audio is attached and whether the output is clamped
//! to the shortest stream.
//!
//! ## Usage
//!
//! ```no_run
//! use coub_archive::encoder::{Encoder, FfmpegEncoder, RenderPlan};
//! use coub_archive::resolver::CoubAsset;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let encoder = FfmpegEncoder::from_path().expect("ffmpeg binary not found");
//!
//!     let asset = CoubAsset {
//!         permalink: "2abc".into(),
//!         video_url: "https://example.com/video.mp4".into(),
//!         audio_url: Some("https://example.com/audio.mp3".into()),
//!     };
//!     let plan = RenderPlan::for_asset(&asset, 999);
//!     encoder.write(&asset, &plan, Path::new("coubs/1587645583.mp4")).await?;
//!
//!     Ok(())
//! }
//! ```

mod ffmpeg;
mod noop;
mod traits;

pub use ffmpeg::FfmpegEncoder;
pub use noop::NoOpEncoder;
pub use traits::{Encoder, RenderPlan};

use crate::config::ToolsConfig;
use std::sync::Arc;

/// Pick an encoder for the given tool settings
///
/// An explicit `ffmpeg_path` wins; otherwise PATH is searched when allowed.
/// Falls back to [`NoOpEncoder`].
pub fn from_config(tools: &ToolsConfig) -> Arc<dyn Encoder> {
    if let Some(ref ffmpeg_path) = tools.ffmpeg_path {
        Arc::new(FfmpegEncoder::new(ffmpeg_path.clone()))
    } else if tools.search_path {
        FfmpegEncoder::from_path()
            .map(|e| Arc::new(e) as Arc<dyn Encoder>)
            .unwrap_or_else(|| Arc::new(NoOpEncoder))
    } else {
        Arc::new(NoOpEncoder)
    }
}
