//! Selection stage: which users are stale enough to archive.

use archive_core::{ActiveStore, EligibleEntity, Error, Result, SelectionCriteria};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{info, warn};

/// Runs the read-only eligibility aggregation against the active store.
pub struct Selector {
    store: Arc<dyn ActiveStore>,
}

impl Selector {
    pub fn new(store: Arc<dyn ActiveStore>) -> Self {
        Self { store }
    }

    /// Eligible users, sorted by `user_id` and de-duplicated.
    pub async fn select(&self, criteria: &SelectionCriteria) -> Result<Vec<EligibleEntity>> {
        let start = Instant::now();

        let aggregates = self
            .store
            .select_eligible(criteria)
            .await
            .map_err(Error::Selection)?;

        let mut eligible = Vec::with_capacity(aggregates.len());
        for aggregate in aggregates {
            // Eviction is destructive, so a group outside the cutoffs never
            // goes further even if the backend returned it.
            if !criteria.qualifies(&aggregate) {
                warn!(
                    user_id = %aggregate.user_id,
                    last_event = %aggregate.last_event,
                    latest_registration = %aggregate.latest_registration,
                    backend = self.store.backend_name(),
                    "Store returned a user outside the cutoffs, skipping"
                );
                continue;
            }

            if aggregate.registration_varies() {
                warn!(
                    user_id = %aggregate.user_id,
                    earliest = %aggregate.earliest_registration,
                    latest = %aggregate.latest_registration,
                    records = aggregate.record_count,
                    "Registration date varies across records, latest governs"
                );
            }

            eligible.push(aggregate.into_eligible());
        }

        eligible.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        eligible.dedup_by(|a, b| a.user_id == b.user_id);

        metrics()
            .select_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        metrics().users_selected.inc_by(eligible.len() as u64);

        info!(
            users = eligible.len(),
            latency_ms = %start.elapsed().as_millis(),
            "Selection complete"
        );

        Ok(eligible)
    }
}
