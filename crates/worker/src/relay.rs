//! Outbox relay: publish pending login rows, then mark them delivered.
//!
//! 1. Fetch a batch of pending rows
//! 2. Publish them to the bus
//! 3. Mark exactly the acknowledged rows delivered
//! 4. Repeat
//!
//! Rows not acknowledged stay pending and go out again on the next pass,
//! so delivery is at-least-once.

use archive_core::{Error, EventPublisher, OutboxSource, RelayConfig, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tracing::{debug, error, info, warn};

/// Counts from one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOutcome {
    pub fetched: usize,
    pub published: usize,
    pub marked: usize,
}

pub struct RelayWorker {
    source: Arc<dyn OutboxSource>,
    publisher: Arc<dyn EventPublisher>,
    config: RelayConfig,
}

impl RelayWorker {
    pub fn new(
        source: Arc<dyn OutboxSource>,
        publisher: Arc<dyn EventPublisher>,
        config: RelayConfig,
    ) -> Self {
        Self {
            source,
            publisher,
            config,
        }
    }

    /// One fetch, publish, mark pass.
    pub async fn run_once(&self) -> Result<RelayOutcome> {
        let rows = self
            .source
            .fetch_pending(self.config.batch_size)
            .await
            .map_err(Error::Relay)?;

        if rows.is_empty() {
            return Ok(RelayOutcome::default());
        }

        let acknowledged = self.publisher.publish(&rows).await.map_err(Error::Relay)?;

        let fetched: HashSet<&str> = rows.iter().map(|r| r.login_id.as_str()).collect();
        let mut seen = HashSet::new();
        let mut outcome = RelayOutcome {
            fetched: rows.len(),
            published: 0,
            marked: 0,
        };

        for login_id in &acknowledged {
            if !fetched.contains(login_id.as_str()) {
                warn!(login_id = %login_id, "Publisher acknowledged a row that was not fetched");
                continue;
            }
            if !seen.insert(login_id.as_str()) {
                continue;
            }
            outcome.published += 1;

            if self
                .source
                .mark_delivered(login_id)
                .await
                .map_err(Error::Relay)?
            {
                outcome.marked += 1;
            } else {
                debug!(login_id = %login_id, "Row already delivered");
            }
        }

        metrics().relay_rows_marked.inc_by(outcome.marked as u64);

        if outcome.published < outcome.fetched {
            warn!(
                unacknowledged = outcome.fetched - outcome.published,
                "Rows left pending for the next pass"
            );
        }

        debug!(
            fetched = outcome.fetched,
            published = outcome.published,
            marked = outcome.marked,
            "Relay pass complete"
        );

        Ok(outcome)
    }

    /// Main run loop. Drains the outbox, idling when it is empty, a pass
    /// fails, or a full batch marked nothing. Runs indefinitely.
    pub async fn run(&self) {
        info!(
            batch_size = self.config.batch_size,
            idle_interval_ms = self.config.idle_interval_ms,
            "Relay worker starting"
        );

        let idle = Duration::from_millis(self.config.idle_interval_ms);

        loop {
            match self.run_once().await {
                Ok(outcome) if outcome.marked > 0 && outcome.fetched == self.config.batch_size => {
                    continue
                }
                Ok(_) => {}
                Err(e) => {
                    metrics().relay_errors.inc();
                    error!(code = e.error_code(), "Relay pass failed: {}", e);
                }
            }

            tokio::time::sleep(idle).await;
        }
    }
}
