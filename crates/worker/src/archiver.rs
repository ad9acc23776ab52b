//! Archive stage: upsert fetched records in bounded batches.

use archive_core::{ActivityRecord, ArchiveStore, Error, Result, UpsertOutcome};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{info, warn};

pub struct Archiver {
    store: Arc<dyn ArchiveStore>,
    batch_size: usize,
}

impl Archiver {
    pub fn new(store: Arc<dyn ArchiveStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Upserts all records.
    ///
    /// A failed batch aborts with [`Error::ArchiveWrite`]. Records the store
    /// neither confirmed nor listed as rejected count as unconfirmed, and
    /// confirmations for ids outside the batch are dropped: only what is in
    /// `confirmed` may be evicted.
    pub async fn archive(&self, records: &[ActivityRecord]) -> Result<UpsertOutcome> {
        let start = Instant::now();
        let mut outcome = UpsertOutcome::default();

        for batch in records.chunks(self.batch_size) {
            let mut result = match self.store.upsert(batch).await {
                Ok(result) => result,
                Err(source) => {
                    return Err(Error::ArchiveWrite {
                        confirmed: outcome.confirmed.len(),
                        source,
                    })
                }
            };

            let batch_ids: HashSet<&str> = batch.iter().map(|r| r.record_id.as_str()).collect();
            let submitted = result.confirmed.len();
            result.confirmed.retain(|id| batch_ids.contains(id.as_str()));
            result.confirmed.sort();
            result.confirmed.dedup();
            if result.confirmed.len() != submitted {
                warn!(
                    backend = self.store.backend_name(),
                    "Archive confirmed unknown or repeated record ids, ignoring them"
                );
            }

            for rejected in &result.rejected {
                warn!(
                    record_id = %rejected.record_id,
                    reason = %rejected.reason,
                    "Archive rejected record, it stays live"
                );
            }

            outcome.merge(result);
        }

        let unconfirmed = records.len().saturating_sub(outcome.confirmed.len());

        metrics()
            .archive_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        metrics()
            .records_archived
            .inc_by(outcome.confirmed.len() as u64);
        metrics().records_unconfirmed.inc_by(unconfirmed as u64);

        if unconfirmed > 0 {
            warn!(
                unconfirmed,
                "Records not confirmed by the archive will be retried next run"
            );
        }

        info!(
            confirmed = outcome.confirmed.len(),
            unconfirmed,
            backend = self.store.backend_name(),
            latency_ms = %start.elapsed().as_millis(),
            "Archive write complete"
        );

        Ok(outcome)
    }
}
