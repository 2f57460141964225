//! Error types for coub-archive
//!
//! This module provides the error handling for the library, including:
//! - A single crate-wide [`Error`] enum with contextual variants
//! - Process exit code mapping for the command-line front end
//! - Machine-readable error codes for logs

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for coub-archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for coub-archive
///
/// Configuration and metadata errors are fatal to a run. Resolve and transcode
/// errors are caught per item by the download coordinator and never escape it.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "user")
        key: Option<String>,
    },

    /// The first timeline page could not be loaded
    ///
    /// Usually means the user does not exist.
    #[error("failed to load metadata for user '{user}': {reason}")]
    FirstPageFailed {
        /// The requested username
        user: String,
        /// HTTP status or transport failure description
        reason: String,
    },

    /// A timeline page after the first could not be loaded
    #[error("failed to load metadata page {page}/{total_pages}: {reason}")]
    PageFailed {
        /// The page that failed (1-based)
        page: u32,
        /// Total number of pages reported by the first response
        total_pages: u32,
        /// HTTP status or transport failure description
        reason: String,
    },

    /// The remote asset of a coub could not be resolved
    #[error("failed to resolve coub '{permalink}': {reason}")]
    Resolve {
        /// Permalink of the coub
        permalink: String,
        /// The reason resolution failed
        reason: String,
    },

    /// The encoder failed to produce the output file
    #[error("transcode failed for {path}: {reason}")]
    Transcode {
        /// The destination path that was being written
        path: PathBuf,
        /// The reason the encode failed (usually the tool's stderr)
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid URL built from configuration
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Process exit codes for fatal errors
pub mod exit_code {
    /// Run finished, possibly with per-item failures
    pub const SUCCESS: u8 = 0;
    /// No username was supplied
    pub const MISSING_USER: u8 = 1;
    /// No output directory was supplied
    pub const MISSING_OUT_DIR: u8 = 2;
    /// The first metadata page failed
    pub const FIRST_PAGE_FAILED: u8 = 3;
    /// A later metadata page failed
    pub const PAGE_FAILED: u8 = 4;
    /// Anything else that went wrong in the metadata phase
    pub const METADATA_UNEXPECTED: u8 = 5;
    /// Some other setting is out of range
    pub const INVALID_CONFIG: u8 = 6;
}

/// Convert errors to process exit codes for the command-line front end
///
/// This trait maps domain errors to the exit code and a machine-readable
/// code used in log output.
pub trait ToExitCode {
    /// Get the process exit code for this error
    fn exit_code(&self) -> u8;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> u8 {
        match self {
            Error::Config { key, .. } => match key.as_deref() {
                Some("user") => exit_code::MISSING_USER,
                Some("out_dir") => exit_code::MISSING_OUT_DIR,
                _ => exit_code::INVALID_CONFIG,
            },
            Error::FirstPageFailed { .. } => exit_code::FIRST_PAGE_FAILED,
            Error::PageFailed { .. } => exit_code::PAGE_FAILED,
            _ => exit_code::METADATA_UNEXPECTED,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::FirstPageFailed { .. } => "first_page_failed",
            Error::PageFailed { .. } => "page_failed",
            Error::Resolve { .. } => "resolve_error",
            Error::Transcode { .. } => "transcode_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Url(_) => "invalid_url",
            Error::Serialization(_) => "serialization_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }
}
