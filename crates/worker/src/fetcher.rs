//! Fetch stage: read every record of the selected users.

use archive_core::{ActiveStore, ActivityRecord, EligibleEntity, Error, Result};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, info};

/// Reads records in user chunks, each chunk paged by `record_id`.
pub struct Fetcher {
    store: Arc<dyn ActiveStore>,
    chunk_size: usize,
    page_size: usize,
}

impl Fetcher {
    pub fn new(store: Arc<dyn ActiveStore>, chunk_size: usize, page_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            page_size: page_size.max(1),
        }
    }

    pub async fn fetch(&self, users: &[EligibleEntity]) -> Result<Vec<ActivityRecord>> {
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let user_ids: Vec<String> = users.iter().map(|u| u.user_id.clone()).collect();
        let mut records = Vec::new();
        let mut pages = 0usize;

        for chunk in user_ids.chunks(self.chunk_size) {
            let mut after: Option<String> = None;

            loop {
                let page = self
                    .store
                    .fetch_page(chunk, after.as_deref(), self.page_size)
                    .await
                    .map_err(Error::Fetch)?;
                pages += 1;

                let exhausted = page.len() < self.page_size;
                if let Some(last) = page.last() {
                    after = Some(last.record_id.clone());
                }
                records.extend(page);

                if exhausted {
                    break;
                }
            }

            debug!(users = chunk.len(), records = records.len(), "Fetched chunk");
        }

        metrics()
            .fetch_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        metrics().records_fetched.inc_by(records.len() as u64);

        info!(
            users = users.len(),
            records = records.len(),
            pages,
            latency_ms = %start.elapsed().as_millis(),
            "Fetch complete"
        );

        Ok(records)
    }
}
