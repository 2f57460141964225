//! Download coordinator — processes the catalog with bounded concurrency.

use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::CoubArchiver;
use crate::encoder::RenderPlan;
use crate::error::Result;
use crate::types::{Catalog, CoubRecord, Event, ItemOutcome, ItemState, RunSummary};

impl CoubArchiver {
    /// Download every coub of `catalog` that is not on disk yet
    ///
    /// At most `max_concurrent_downloads` coubs are processed at once. Each
    /// coub runs in its own task, so an error or panic while processing one
    /// never reaches its siblings. Outcomes flow back to this function, which
    /// is the only owner of the tally.
    ///
    /// Returns once every coub has reached a terminal outcome.
    pub async fn download_all(&self, catalog: Catalog) -> RunSummary {
        let total = catalog.len();
        let concurrency = self.config.download.max_concurrent_downloads.max(1);
        let mut summary = RunSummary::new(total);

        info!(
            total,
            concurrency,
            encoder = self.encoder.name(),
            "Downloading coubs"
        );

        let mut outcomes = stream::iter(catalog)
            .map(|record| {
                let archiver = self.clone();
                let worker_record = record.clone();

                async move {
                    let worker =
                        tokio::spawn(async move { archiver.process_item(&worker_record).await });

                    let outcome = match worker.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(
                                permalink = %record.permalink,
                                error = %e,
                                "Download worker panicked"
                            );
                            ItemOutcome::Failed {
                                error: format!("worker panicked: {}", e),
                            }
                        }
                    };
                    (record, outcome)
                }
            })
            .buffer_unordered(concurrency);

        while let Some((record, outcome)) = outcomes.next().await {
            if let ItemOutcome::Failed { error } = &outcome {
                warn!(permalink = %record.permalink, error = %error, "Coub download failed");
                self.event_tx
                    .send(Event::ItemFailed {
                        permalink: record.permalink.clone(),
                        error: error.clone(),
                    })
                    .ok();
            }

            summary.record(record, &outcome);
            self.event_tx
                .send(Event::Progress {
                    completed: summary.completed(),
                    succeeded: summary.succeeded,
                    total,
                })
                .ok();
        }

        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "Download finished"
        );
        self.event_tx
            .send(Event::RunComplete {
                succeeded: summary.succeeded,
                failed: summary.failed.len(),
            })
            .ok();

        summary
    }

    /// Take one coub from `Pending` to a terminal outcome
    pub(crate) async fn process_item(&self, record: &CoubRecord) -> ItemOutcome {
        let dest = record.output_path(&self.config.out_dir);

        let outcome = match tokio::fs::try_exists(&dest).await {
            Ok(true) => {
                debug!(permalink = %record.permalink, dest = %dest.display(), "Already archived");
                ItemOutcome::SkippedExisting
            }
            Ok(false) => match self.render(record, &dest).await {
                Ok(()) => ItemOutcome::Done,
                Err(e) => ItemOutcome::Failed {
                    error: e.to_string(),
                },
            },
            Err(e) => ItemOutcome::Failed {
                error: format!("cannot check '{}': {}", dest.display(), e),
            },
        };

        self.emit_state(record, outcome.state());
        outcome
    }

    /// Resolve the remote streams and hand them to the encoder
    async fn render(&self, record: &CoubRecord, dest: &Path) -> Result<()> {
        // Coubs created in the same second share a destination; the last
        // encode to finish wins and both are counted as done.
        debug!(permalink = %record.permalink, dest = %dest.display(), "Rendering coub");
        self.emit_state(record, ItemState::Resolving);
        let asset = self.resolver.resolve(record).await?;

        let plan = self
            .config
            .tools
            .extra_ffmpeg_args
            .iter()
            .fold(
                RenderPlan::for_asset(&asset, self.config.download.max_loop_count),
                |plan, option| plan.add_option(option.clone()),
            );

        self.emit_state(record, ItemState::Encoding);
        self.encoder.write(&asset, &plan, dest).await?;

        info!(permalink = %record.permalink, dest = %dest.display(), "Coub archived");
        Ok(())
    }

    fn emit_state(&self, record: &CoubRecord, state: ItemState) {
        self.event_tx
            .send(Event::ItemState {
                permalink: record.permalink.clone(),
                state,
            })
            .ok();
    }
}
