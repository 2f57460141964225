//! No-op encoder for graceful degradation

use super::traits::{Encoder, RenderPlan};
use crate::resolver::CoubAsset;
use async_trait::async_trait;
use std::path::Path;

/// Encoder used when no ffmpeg binary is available
///
/// Every write returns `Error::NotSupported`. The coordinator records each
/// coub as failed and the run still completes, so the catalog snapshot and
/// the failure report are produced even without ffmpeg.
pub struct NoOpEncoder;

#[async_trait]
impl Encoder for NoOpEncoder {
    async fn write(&self, _asset: &CoubAsset, _plan: &RenderPlan, _dest: &Path) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "Encoding requires an external ffmpeg binary. \
             Configure ffmpeg_path in config or ensure ffmpeg is in PATH."
                .into(),
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
