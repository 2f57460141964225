//! The archiver: one metadata pass followed by one download pass.
//!
//! The `CoubArchiver` struct and its methods are organized by phase:
//! - this module - construction, event subscription, the metadata phase
//! - [`download`] - the bounded-concurrency download coordinator

mod download;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::encoder::{self, Encoder};
use crate::error::{Error, Result};
use crate::metadata::{self, MetadataClient};
use crate::resolver::{AssetResolver, CoubApiResolver};
use crate::types::{Catalog, Event, RunSummary};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main archiver instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct CoubArchiver {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Timeline client
    pub(crate) metadata: Arc<MetadataClient>,
    /// Looks up video/audio URLs per coub (trait object for pluggable implementations)
    pub(crate) resolver: Arc<dyn AssetResolver>,
    /// Writes the output files (trait object for pluggable implementations)
    pub(crate) encoder: Arc<dyn Encoder>,
}

impl CoubArchiver {
    /// Create an archiver with the platform resolver and the configured encoder
    ///
    /// The configuration is validated first, so a missing username or output
    /// directory fails here, before any network activity.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let resolver = Arc::new(CoubApiResolver::new(&config.api)?);
        let encoder = encoder::from_config(&config.tools);
        Self::with_components(config, resolver, encoder)
    }

    /// Create an archiver with explicit resolver and encoder implementations
    pub fn with_components(
        config: Config,
        resolver: Arc<dyn AssetResolver>,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let metadata = Arc::new(MetadataClient::new(config.api.clone(), event_tx.clone())?);

        tracing::info!(
            user = %config.user,
            out_dir = %config.out_dir.display(),
            encoder = encoder.name(),
            "Archiver initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            event_tx,
            metadata,
            resolver,
            encoder,
        })
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this archiver runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metadata phase: fetch the whole catalog and write the snapshot
    ///
    /// The catalog is always fetched fresh. The snapshot is written only if
    /// none exists yet. The output directory is created after the first
    /// page succeeded, so a failing fetch leaves the filesystem untouched.
    pub async fn load_catalog(&self) -> Result<Catalog> {
        let catalog = self.metadata.fetch_catalog(&self.config.user).await?;

        let out_dir = &self.config.out_dir;
        tokio::fs::create_dir_all(out_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create output directory '{}': {}",
                    out_dir.display(),
                    e
                ),
            ))
        })?;

        let snapshot_written = metadata::write_snapshot(out_dir, &catalog).await?;
        self.event_tx
            .send(Event::MetadataLoaded {
                count: catalog.len(),
                snapshot_written,
            })
            .ok();

        Ok(catalog)
    }

    /// Run both phases
    ///
    /// Metadata errors are returned; download failures are reported in the
    /// returned [`RunSummary`].
    pub async fn run(&self) -> Result<RunSummary> {
        let catalog = self.load_catalog().await?;
        Ok(self.download_all(catalog).await)
    }
}
