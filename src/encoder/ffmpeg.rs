//! Encoder backed by an external ffmpeg binary

use super::traits::{Encoder, RenderPlan};
use crate::resolver::CoubAsset;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Encoder that runs the external `ffmpeg` binary
///
/// ffmpeg reads the remote streams directly and copies them without
/// re-encoding. Output goes to a hidden `.part` sibling of the destination
/// and is renamed into place only after ffmpeg exits successfully.
///
/// # Examples
///
/// ```no_run
/// use coub_archive::encoder::FfmpegEncoder;
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let encoder = FfmpegEncoder::new(PathBuf::from("/usr/bin/ffmpeg"));
///
/// // Or auto-discover from PATH
/// let encoder = FfmpegEncoder::from_path().expect("ffmpeg not found in PATH");
/// ```
pub struct FfmpegEncoder {
    binary_path: PathBuf,
}

impl FfmpegEncoder {
    /// Create a new encoder with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    ///
    /// Returns `None` if the binary is not found.
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Path of the binary this encoder runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Temporary output path used while ffmpeg is running
    pub(crate) fn partial_path(dest: &Path) -> PathBuf {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        dest.with_file_name(format!(".{}.part", name))
    }

    /// Command line for rendering `asset` into `output`
    pub(crate) fn build_args(asset: &CoubAsset, plan: &RenderPlan, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-nostdin", "-y", "-loglevel", "error"]
            .iter()
            .map(OsString::from)
            .collect();

        // -stream_loop counts repetitions after the first playback
        if plan.loop_count > 1 {
            args.push("-stream_loop".into());
            args.push((plan.loop_count - 1).to_string().into());
        }
        args.push("-i".into());
        args.push(asset.video_url.as_str().into());

        if let (true, Some(audio_url)) = (plan.attach_audio, asset.audio_url.as_deref()) {
            args.push("-i".into());
            args.push(audio_url.into());
            for map in ["-map", "0:v:0", "-map", "1:a:0"] {
                args.push(map.into());
            }
        }

        args.push("-c".into());
        args.push("copy".into());
        if plan.shortest {
            args.push("-shortest".into());
        }
        args.extend(plan.extra_options.iter().map(OsString::from));

        // The .part extension hides the container from ffmpeg's format guessing
        args.push("-f".into());
        args.push("mp4".into());
        args.push(output.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn write(&self, asset: &CoubAsset, plan: &RenderPlan, dest: &Path) -> crate::Result<()> {
        let partial = Self::partial_path(dest);
        let transcode_error = |reason: String| crate::Error::Transcode {
            path: dest.to_path_buf(),
            reason,
        };

        debug!(
            permalink = %asset.permalink,
            loop_count = plan.loop_count,
            attach_audio = plan.attach_audio,
            dest = %dest.display(),
            "Running ffmpeg"
        );

        let output = Command::new(&self.binary_path)
            .args(Self::build_args(asset, plan, &partial))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| transcode_error(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            tokio::fs::remove_file(&partial).await.ok();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                format!("ffmpeg exited with {}", output.status)
            } else {
                stderr
            };
            return Err(transcode_error(reason));
        }

        tokio::fs::rename(&partial, dest).await.map_err(|e| {
            transcode_error(format!(
                "Failed to move '{}' into place: {}",
                partial.display(),
                e
            ))
        })
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
