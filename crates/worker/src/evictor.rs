//! Eviction stage: delete confirmed-archived records from the active store.

use archive_core::{ActiveStore, Error, Result};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{error, info};

pub struct Evictor {
    store: Arc<dyn ActiveStore>,
}

impl Evictor {
    pub fn new(store: Arc<dyn ActiveStore>) -> Self {
        Self { store }
    }

    /// Deletes exactly `record_ids` in one bulk call. Returns the number
    /// removed.
    pub async fn evict(&self, record_ids: &[String]) -> Result<u64> {
        if record_ids.is_empty() {
            metrics().duplicated_records.set(0);
            return Ok(0);
        }

        let start = Instant::now();

        match self.store.delete_records(record_ids).await {
            Ok(deleted) => {
                metrics()
                    .evict_latency_ms
                    .observe(start.elapsed().as_millis() as u64);
                metrics().records_evicted.inc_by(deleted);
                metrics().duplicated_records.set(0);

                info!(
                    requested = record_ids.len(),
                    deleted,
                    latency_ms = %start.elapsed().as_millis(),
                    "Eviction complete"
                );
                Ok(deleted)
            }
            Err(source) => {
                metrics().eviction_errors.inc();
                metrics().duplicated_records.set(record_ids.len() as u64);

                error!(
                    target: "archival::eviction",
                    duplicated = record_ids.len(),
                    error = %source,
                    "Eviction failed, archived records remain in the active store"
                );
                Err(Error::Eviction {
                    pending: record_ids.len(),
                    source,
                })
            }
        }
    }
}
