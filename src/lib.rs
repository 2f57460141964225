//! # coub-archive
//!
//! Archives every public coub of one user into a local directory.
//!
//! A run has two phases:
//! - **Metadata** - the user's channel timeline is fetched page by page into
//!   an ordered [`Catalog`], and a snapshot is written to
//!   `<out_dir>/.metadata.json` unless one already exists
//! - **Download** - each coub is rendered to `<out_dir>/<unix-seconds>.mp4`
//!   by an [`Encoder`](encoder::Encoder), at most three at a time; coubs whose
//!   file already exists are skipped, and failures are collected instead of
//!   ending the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use coub_archive::{Config, CoubArchiver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::for_user("alice");
//!     config.out_dir = "archive".into();
//!
//!     let archiver = CoubArchiver::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = archiver.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = archiver.run().await?;
//!     println!("{} coubs archived, {} failed", summary.succeeded, summary.failed.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive orchestration (metadata phase and download coordinator)
pub mod archiver;
/// Configuration types
pub mod config;
/// Rendering coubs to mp4 files
pub mod encoder;
/// Error types
pub mod error;
/// Timeline fetching and catalog snapshot
pub mod metadata;
/// Per-coub media lookup
pub mod resolver;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use archiver::CoubArchiver;
pub use config::{ApiConfig, Config, DownloadConfig, ToolsConfig};
pub use encoder::{Encoder, FfmpegEncoder, NoOpEncoder, RenderPlan};
pub use error::{Error, Result, ToExitCode, exit_code};
pub use resolver::{AssetResolver, CoubApiResolver, CoubAsset};
pub use types::{Catalog, CoubRecord, Event, FailedItem, ItemOutcome, ItemState, RunSummary};
