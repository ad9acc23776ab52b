//! Periodic trigger for the archival job.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use archive_core::RunStatus;

use crate::job::ArchivalJob;

/// Runs the job on a fixed interval. Each run is awaited before the next
/// tick, so runs from one scheduler never overlap.
pub struct JobScheduler {
    job: Arc<ArchivalJob>,
    interval: Duration,
}

impl JobScheduler {
    pub fn new(job: Arc<ArchivalJob>, interval: Duration) -> Self {
        Self { job, interval }
    }

    pub fn from_config(job: Arc<ArchivalJob>) -> Self {
        let interval = Duration::from_secs(job.config().schedule_interval_secs);
        Self::new(job, interval)
    }

    /// Starts the scheduler on a background task.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Archival scheduler started");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.job.run().await {
                Ok(summary) if summary.status() == RunStatus::EvictionIncomplete => {
                    warn!("Scheduled run left records duplicated: {}", summary);
                }
                Ok(summary) => info!("Scheduled run finished: {}", summary),
                Err(e) => error!(code = e.error_code(), "Scheduled run failed: {}", e),
            }
        }
    }
}
