//! Core types for coub-archive

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One catalog entry of a user's channel
///
/// Only the fields the archiver relies on are typed; everything else the
/// platform sends is kept in `extra` so the snapshot stays a faithful copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoubRecord {
    /// Stable identifier used in `/view/{permalink}` URLs
    pub permalink: String,

    /// Creation timestamp, used to derive the output filename
    pub created_at: DateTime<Utc>,

    /// Whether the platform lists an audio track for this coub
    #[serde(default)]
    pub has_sound: bool,

    /// Remaining platform metadata, untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CoubRecord {
    /// Create a record with no extra metadata
    pub fn new(permalink: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            permalink: permalink.into(),
            created_at,
            has_sound: false,
            extra: serde_json::Map::new(),
        }
    }

    /// Output filename: creation time in whole seconds since the epoch, `.mp4`
    ///
    /// Milliseconds are rounded half-up to the nearest second, so two coubs
    /// created within the same second map to the same file.
    pub fn file_name(&self) -> String {
        let millis = self.created_at.timestamp_millis();
        format!("{}.mp4", (millis + 500).div_euclid(1000))
    }

    /// Destination path of this coub inside `out_dir`
    pub fn output_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(self.file_name())
    }
}

/// Ordered list of every coub of one user, built once per run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    items: Vec<CoubRecord>,
}

impl Catalog {
    /// Wrap an already ordered list of records
    pub fn new(items: Vec<CoubRecord>) -> Self {
        Self { items }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog has no records
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records in page order
    pub fn items(&self) -> &[CoubRecord] {
        &self.items
    }

    /// Iterate over records in page order
    pub fn iter(&self) -> std::slice::Iter<'_, CoubRecord> {
        self.items.iter()
    }

    pub(crate) fn extend(&mut self, page: Vec<CoubRecord>) {
        self.items.extend(page);
    }
}

impl IntoIterator for Catalog {
    type Item = CoubRecord;
    type IntoIter = std::vec::IntoIter<CoubRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Processing state of a single coub
///
/// `Pending → {SkippedExisting | Resolving → Encoding → {Done | Failed}}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Not yet picked up by a worker
    Pending,
    /// Output file was already present
    SkippedExisting,
    /// Looking up the remote video and audio
    Resolving,
    /// External encoder is writing the output file
    Encoding,
    /// Output file written
    Done,
    /// Resolution or encoding failed
    Failed,
}

impl ItemState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemState::SkippedExisting | ItemState::Done | ItemState::Failed
        )
    }
}

/// Terminal result of processing one coub
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The output file existed before processing
    SkippedExisting,
    /// The output file was written by the encoder
    Done,
    /// The coub could not be archived
    Failed {
        /// Display text of the underlying error
        error: String,
    },
}

impl ItemOutcome {
    /// Whether this outcome counts towards the success tally
    pub fn is_success(&self) -> bool {
        !matches!(self, ItemOutcome::Failed { .. })
    }

    /// The terminal state corresponding to this outcome
    pub fn state(&self) -> ItemState {
        match self {
            ItemOutcome::SkippedExisting => ItemState::SkippedExisting,
            ItemOutcome::Done => ItemState::Done,
            ItemOutcome::Failed { .. } => ItemState::Failed,
        }
    }
}

/// A coub that could not be archived, with its cause
#[derive(Clone, Debug, PartialEq)]
pub struct FailedItem {
    /// The record as fetched
    pub record: CoubRecord,
    /// Display text of the error
    pub error: String,
}

/// Tally of one download phase
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Number of coubs in the catalog
    pub total: usize,
    /// Coubs that are now on disk (downloaded or already present)
    pub succeeded: usize,
    /// Subset of `succeeded` that was already present
    pub skipped: usize,
    /// Coubs that failed, in completion order
    pub failed: Vec<FailedItem>,
}

impl RunSummary {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Fold one outcome into the tally
    pub(crate) fn record(&mut self, record: CoubRecord, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::SkippedExisting => {
                self.succeeded += 1;
                self.skipped += 1;
            }
            ItemOutcome::Done => self.succeeded += 1,
            ItemOutcome::Failed { error } => self.failed.push(FailedItem {
                record,
                error: error.clone(),
            }),
        }
    }

    /// Number of coubs that reached a terminal outcome
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    /// Whether any coub failed
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Event emitted while archiving
///
/// Subscribers receive these through [`CoubArchiver::subscribe`](crate::CoubArchiver::subscribe).
/// Nothing in the archiver depends on anyone listening.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A timeline page was loaded
    MetadataPage {
        /// Page number (1-based)
        page: u32,
        /// Total pages reported by the API
        total_pages: u32,
    },

    /// The whole catalog was loaded
    MetadataLoaded {
        /// Number of coubs found
        count: usize,
        /// Whether a new snapshot file was written
        snapshot_written: bool,
    },

    /// A coub moved to a new state
    ItemState {
        /// Permalink of the coub
        permalink: String,
        /// New state
        state: ItemState,
    },

    /// A coub failed
    ItemFailed {
        /// Permalink of the coub
        permalink: String,
        /// Error message
        error: String,
    },

    /// Download phase progress
    Progress {
        /// Coubs that reached a terminal outcome
        completed: usize,
        /// Coubs that are now on disk
        succeeded: usize,
        /// Coubs in the catalog
        total: usize,
    },

    /// Download phase finished
    RunComplete {
        /// Coubs that are now on disk
        succeeded: usize,
        /// Coubs that failed
        failed: usize,
    },
}
