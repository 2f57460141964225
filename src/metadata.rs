//! Timeline metadata fetching and the one-time catalog snapshot
//!
//! The timeline endpoint is paginated. Page 1 reports `total_pages`; the
//! remaining pages are requested one after another and appended in page
//! order. Any page failure ends the run: a failing first page usually means
//! the user does not exist, a failing later page is usually transient, so the
//! two are reported as different errors.

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{Catalog, CoubRecord, Event};
use serde::Deserialize;
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, info};
use url::Url;

/// Name of the catalog snapshot inside the output directory
pub const SNAPSHOT_FILE: &str = ".metadata.json";

/// One page of the channel timeline
#[derive(Clone, Debug, Deserialize)]
pub struct TimelinePage {
    /// Page number (1-based)
    #[serde(default)]
    pub page: u32,
    /// Total pages for this channel; 0 for an empty channel
    #[serde(default)]
    pub total_pages: u32,
    /// Page size the server applied
    #[serde(default)]
    pub per_page: u32,
    /// Records on this page
    #[serde(default)]
    pub coubs: Vec<CoubRecord>,
}

/// Why a single page could not be used
#[derive(Debug)]
pub(crate) enum PageFetchError {
    /// Non-success status or transport failure
    Unavailable(String),
    /// Anything else (malformed body, bad URL)
    Unexpected(Error),
}

/// Paginated client for the channel timeline
pub struct MetadataClient {
    http: reqwest::Client,
    api: ApiConfig,
    event_tx: broadcast::Sender<Event>,
}

impl MetadataClient {
    /// Create a client for the given API settings
    ///
    /// Page events are sent on `event_tx`; nobody has to be listening.
    pub fn new(api: ApiConfig, event_tx: broadcast::Sender<Event>) -> Result<Self> {
        let http = api.http_client()?;
        Ok(Self {
            http,
            api,
            event_tx,
        })
    }

    /// Build the timeline URL for `user` and `page`
    pub fn timeline_url(&self, user: &str, page: u32) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/api/v2/timeline/channel/{}",
            self.api.base_url.trim_end_matches('/'),
            urlencoding::encode(user)
        ))?;
        url.query_pairs_mut()
            .append_pair("order_by", &self.api.order_by)
            .append_pair("type", &self.api.item_type)
            .append_pair("scope", &self.api.scope)
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.api.per_page.to_string());
        Ok(url)
    }

    /// Fetch every record of `user`, in page order
    ///
    /// # Errors
    ///
    /// - [`Error::FirstPageFailed`] if page 1 returns a non-success status or
    ///   cannot be reached
    /// - [`Error::PageFailed`] if a later page does
    /// - any other variant for malformed responses
    pub async fn fetch_catalog(&self, user: &str) -> Result<Catalog> {
        let first = self.fetch_page(user, 1).await.map_err(|e| match e {
            PageFetchError::Unavailable(reason) => Error::FirstPageFailed {
                user: user.to_string(),
                reason,
            },
            PageFetchError::Unexpected(e) => e,
        })?;

        let total_pages = first.total_pages;
        self.event_tx
            .send(Event::MetadataPage {
                page: 1,
                total_pages,
            })
            .ok();

        let mut catalog = Catalog::new(first.coubs);

        for page in 2..=total_pages {
            let next = self.fetch_page(user, page).await.map_err(|e| match e {
                PageFetchError::Unavailable(reason) => Error::PageFailed {
                    page,
                    total_pages,
                    reason,
                },
                PageFetchError::Unexpected(e) => e,
            })?;

            debug!(
                user,
                page,
                total_pages,
                items = next.coubs.len(),
                "Loaded timeline page"
            );
            self.event_tx
                .send(Event::MetadataPage { page, total_pages })
                .ok();
            catalog.extend(next.coubs);
        }

        info!(user, total_pages, coubs = catalog.len(), "Metadata loaded");
        Ok(catalog)
    }

    /// Fetch and decode one page, checking that page's own response status
    pub(crate) async fn fetch_page(
        &self,
        user: &str,
        page: u32,
    ) -> std::result::Result<TimelinePage, PageFetchError> {
        let url = self
            .timeline_url(user, page)
            .map_err(PageFetchError::Unexpected)?;

        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timeout fetching '{}'", url)
            } else if e.is_connect() {
                format!("connection failed for '{}': {}", url, e)
            } else {
                format!("request to '{}' failed: {}", url, e)
            };
            PageFetchError::Unavailable(reason)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageFetchError::Unavailable(format!("HTTP {}", status)));
        }

        let body = response.bytes().await.map_err(|e| {
            PageFetchError::Unavailable(format!("failed to read response body: {}", e))
        })?;

        serde_json::from_slice(&body).map_err(|e| PageFetchError::Unexpected(e.into()))
    }
}

/// Write `catalog` to `<out_dir>/.metadata.json` unless that file exists
///
/// The JSON is staged in a hidden `.part` sibling and hard-linked into place.
/// The link fails if the snapshot already exists, so an existing snapshot is
/// never replaced, and a failed write never leaves a partial snapshot behind.
/// Returns whether a file was written.
pub async fn write_snapshot(out_dir: &Path, catalog: &Catalog) -> Result<bool> {
    let path = out_dir.join(SNAPSHOT_FILE);
    if tokio::fs::try_exists(&path).await? {
        debug!(path = %path.display(), "Snapshot already exists, leaving it untouched");
        return Ok(false);
    }

    let json = serde_json::to_vec(catalog)?;
    let staged = out_dir.join(format!("{}.part", SNAPSHOT_FILE));

    if let Err(e) = tokio::fs::write(&staged, &json).await {
        tokio::fs::remove_file(&staged).await.ok();
        return Err(Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write snapshot '{}': {}", staged.display(), e),
        )));
    }

    let linked = tokio::fs::hard_link(&staged, &path).await;
    tokio::fs::remove_file(&staged).await.ok();

    match linked {
        Ok(()) => {
            info!(path = %path.display(), coubs = catalog.len(), "Snapshot written");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "Snapshot already exists, leaving it untouched");
            Ok(false)
        }
        Err(e) => Err(Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create snapshot '{}': {}", path.display(), e),
        ))),
    }
}
