use chrono::Utc;
use std::sync::Arc;

use crate::config::MigrationConfig;
use crate::core::Result;
use crate::modules::events::repositories::{DurableEventRepository, HotEventRepository};

/// Summary of one migration run
#[derive(Debug, Default, Clone, Copy)]
pub struct MigrationReport {
    pub batches: u32,
    pub migrated: usize,
    pub skipped: usize,
}

/// Drains unprocessed hot-store events into the durable store in bounded
/// batches.
///
/// Fail-fast: the first insert error aborts the run; sub-batches already
/// committed keep their progress and the unchanged `processed_at` watermark
/// makes the next run resume where this one stopped.
pub struct MigrationWorker {
    hot: Arc<HotEventRepository>,
    durable: Arc<DurableEventRepository>,
    config: MigrationConfig,
}

impl MigrationWorker {
    pub fn new(
        hot: Arc<HotEventRepository>,
        durable: Arc<DurableEventRepository>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            hot,
            durable,
            config,
        }
    }

    /// One bounded migration pass.
    ///
    /// Per batch: fetch oldest unprocessed events, insert into the durable
    /// store (conflict on idempotency key skips), then mark only the inserted
    /// ids as processed. Skipped ids stay unprocessed for the next run; the
    /// skip itself proves the durable store already holds the event, so no
    /// data is lost either way. Stops early on a short batch.
    pub async fn run_once(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        for _ in 0..self.config.max_batches {
            let events = self.hot.fetch_unprocessed(self.config.batch_size).await?;
            if events.is_empty() {
                break;
            }
            let fetched = events.len();

            let outcome = self.durable.insert_events(&events).await?;

            if !outcome.inserted.is_empty() {
                self.hot
                    .mark_processed(&outcome.inserted, Utc::now())
                    .await?;
            }

            report.batches += 1;
            report.migrated += outcome.inserted.len();
            report.skipped += outcome.skipped.len();

            tracing::debug!(
                batch = report.batches,
                fetched = fetched,
                inserted = outcome.inserted.len(),
                skipped = outcome.skipped.len(),
                "Hot-store batch migrated"
            );

            if (fetched as i64) < self.config.batch_size {
                break;
            }
        }

        if report.migrated > 0 || report.skipped > 0 {
            tracing::info!(
                batches = report.batches,
                migrated = report.migrated,
                skipped = report.skipped,
                "Migration run complete"
            );
        }

        Ok(report)
    }

    /// Delete hot-store rows processed longer ago than the retention window
    pub async fn purge_hot_store(&self) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(self.config.retention_days);
        let purged = self.hot.purge_processed_before(cutoff).await?;
        if purged > 0 {
            tracing::info!(purged = purged, cutoff = %cutoff, "Hot-store retention purge complete");
        }
        Ok(purged)
    }
}
