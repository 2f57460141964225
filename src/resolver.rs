//! Resolving a catalog record to downloadable media URLs

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::CoubRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Video qualities in order of preference
const VIDEO_QUALITIES: &[&str] = &["higher", "high", "med"];
/// Audio qualities in order of preference
const AUDIO_QUALITIES: &[&str] = &["high", "med"];

/// Remote media of one coub
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoubAsset {
    /// Permalink of the coub
    pub permalink: String,
    /// URL of the (silent) video stream
    pub video_url: String,
    /// URL of the audio track, if the coub has one
    pub audio_url: Option<String>,
}

impl CoubAsset {
    /// Whether an audio track is available
    pub fn has_audio(&self) -> bool {
        self.audio_url.is_some()
    }
}

/// Looks up the media behind a catalog record
#[async_trait]
pub trait AssetResolver: Send + Sync {
    /// Resolve `record` to its video and optional audio URLs
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolve`] if the coub cannot be looked up or has no
    /// playable video.
    async fn resolve(&self, record: &CoubRecord) -> Result<CoubAsset>;
}

#[derive(Debug, Deserialize)]
struct CoubDetails {
    #[serde(default)]
    file_versions: FileVersions,
}

#[derive(Debug, Default, Deserialize)]
struct FileVersions {
    #[serde(default)]
    html5: Html5Versions,
}

#[derive(Debug, Default, Deserialize)]
struct Html5Versions {
    #[serde(default)]
    video: HashMap<String, MediaVersion>,
    #[serde(default)]
    audio: HashMap<String, MediaVersion>,
}

#[derive(Debug, Deserialize)]
struct MediaVersion {
    url: Option<String>,
}

fn best_url(versions: &HashMap<String, MediaVersion>, preference: &[&str]) -> Option<String> {
    preference
        .iter()
        .filter_map(|quality| versions.get(*quality))
        .find_map(|v| v.url.clone().filter(|u| !u.is_empty()))
}

/// Resolver backed by the platform's per-coub endpoint
///
/// Requests `{base_url}/api/v2/coubs/{permalink}` and picks the best HTML5
/// video and audio versions.
pub struct CoubApiResolver {
    http: reqwest::Client,
    base_url: String,
}

impl CoubApiResolver {
    /// Create a resolver for the given API settings
    pub fn new(api: &ApiConfig) -> Result<Self> {
        Ok(Self {
            http: api.http_client()?,
            base_url: api.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn coub_url(&self, permalink: &str) -> String {
        format!(
            "{}/api/v2/coubs/{}",
            self.base_url,
            urlencoding::encode(permalink)
        )
    }
}

#[async_trait]
impl AssetResolver for CoubApiResolver {
    async fn resolve(&self, record: &CoubRecord) -> Result<CoubAsset> {
        let permalink = record.permalink.as_str();
        let failed = |reason: String| Error::Resolve {
            permalink: permalink.to_string(),
            reason,
        };

        let url = self.coub_url(permalink);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(format!("request to '{}' failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let details: CoubDetails = response
            .json()
            .await
            .map_err(|e| failed(format!("invalid coub details: {}", e)))?;

        let html5 = details.file_versions.html5;
        let video_url = best_url(&html5.video, VIDEO_QUALITIES)
            .ok_or_else(|| failed("no video version available".to_string()))?;
        let audio_url = best_url(&html5.audio, AUDIO_QUALITIES);

        debug!(
            permalink,
            has_audio = audio_url.is_some(),
            "Resolved coub asset"
        );

        Ok(CoubAsset {
            permalink: permalink.to_string(),
            video_url,
            audio_url,
        })
    }
}
