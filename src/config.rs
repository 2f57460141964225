//! Configuration types for coub-archive

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote API settings (endpoint, paging, timeline filters)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the platform (default: "https://coub.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeline page size (default: 25)
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Timeline ordering (default: "newest")
    #[serde(default = "default_order_by")]
    pub order_by: String,

    /// Timeline item type filter (default: "simples")
    #[serde(default = "default_item_type")]
    pub item_type: String,

    /// Timeline scope filter (default: "all")
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Per-request HTTP timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ApiConfig {
    /// Per-request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the shared HTTP client for this API configuration
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| Error::config("api", format!("Failed to create HTTP client: {}", e)))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            per_page: default_per_page(),
            order_by: default_order_by(),
            item_type: default_item_type(),
            scope: default_scope(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Download behavior configuration (concurrency, looping)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum number of coubs processed at once (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// How many times a video is looped when it carries an audio track (default: 999)
    ///
    /// The output is clamped to the shortest stream, so this only has to be
    /// large enough for the video loop to outlast the audio.
    #[serde(default = "default_max_loop_count")]
    pub max_loop_count: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            max_loop_count: default_max_loop_count(),
        }
    }
}

/// External tool configuration (ffmpeg)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Extra arguments passed to ffmpeg before the output path
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

/// Main configuration for [`CoubArchiver`](crate::CoubArchiver)
///
/// Download and tool settings are flattened so a JSON config file stays a
/// single flat object apart from the `api` section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Username whose channel is archived (required)
    #[serde(default)]
    pub user: String,

    /// Output directory (default: "./coubs")
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// External tool settings
    #[serde(flatten)]
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: String::new(),
            out_dir: default_out_dir(),
            api: ApiConfig::default(),
            download: DownloadConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Create a configuration for `user` with all other settings at their defaults
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "config",
                format!("Failed to read config file '{}': {}", path.display(), e),
            )
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("invalid config file '{}': {}", path.display(), e),
            key: None,
        })
    }

    /// Path of the one-time catalog snapshot inside the output directory
    pub fn snapshot_path(&self) -> PathBuf {
        self.out_dir.join(crate::metadata::SNAPSHOT_FILE)
    }

    /// Check required settings before any network activity
    ///
    /// Missing username and missing output directory are reported with their
    /// own keys so callers can tell them apart.
    pub fn validate(&self) -> Result<()> {
        if self.user.trim().is_empty() {
            return Err(Error::config("user", "no username is given"));
        }
        if self.out_dir.as_os_str().is_empty() {
            return Err(Error::config("out_dir", "no output directory is given"));
        }
        if self.api.per_page == 0 {
            return Err(Error::config("per_page", "page size must be at least 1"));
        }
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "max_concurrent_downloads",
                "concurrency must be at least 1",
            ));
        }
        if self.download.max_loop_count == 0 {
            return Err(Error::config(
                "max_loop_count",
                "loop count must be at least 1",
            ));
        }
        url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config("base_url", format!("invalid base URL: {}", e)))?;
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://coub.com".to_string()
}

fn default_per_page() -> u32 {
    25
}

fn default_order_by() -> String {
    "newest".to_string()
}

fn default_item_type() -> String {
    "simples".to_string()
}

fn default_scope() -> String {
    "all".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("coub-archive/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_loop_count() -> u32 {
    999
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("./coubs")
}

fn default_true() -> bool {
    true
}
