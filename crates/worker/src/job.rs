//! Orchestrator: select, fetch, archive, evict, report.
//!
//! Nothing is deleted from the active store until the archive confirmed the
//! write. A failure at select, fetch or archive aborts the run with nothing
//! evicted and a failure report written. An eviction failure leaves records
//! duplicated in both stores; the run still returns its summary, with
//! status `eviction_incomplete`, and the next run re-selects them.

use archive_core::{
    ActiveStore, ActivityRecord, ArchivalConfig, ArchiveStore, Error, Result, RunReport,
    RunStatus, SelectionCriteria,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::archiver::Archiver;
use crate::evictor::Evictor;
use crate::fetcher::Fetcher;
use crate::reporter::{ReportDelivery, Reporter};
use crate::selector::Selector;

/// Outcome of a run that got past the archive stage, or had nothing to do.
#[derive(Debug)]
pub struct RunSummary {
    pub report: RunReport,
    pub report_delivery: ReportDelivery,
    /// Set when status is `eviction_incomplete`.
    pub eviction_error: Option<Error>,
}

impl RunSummary {
    pub fn status(&self) -> RunStatus {
        self.report.status
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self.report.status {
            RunStatus::EvictionIncomplete => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: archived {} records of {} users, evicted {}",
            self.report.status.as_str(),
            self.report.archived_records_count,
            self.report.archived_users_count,
            self.report.evicted_records_count
        )
    }
}

/// One archival job, built once per invocation from validated config.
pub struct ArchivalJob {
    config: ArchivalConfig,
    selector: Selector,
    fetcher: Fetcher,
    archiver: Archiver,
    evictor: Evictor,
    reporter: Reporter,
}

impl ArchivalJob {
    pub fn new(
        config: ArchivalConfig,
        active: Arc<dyn ActiveStore>,
        archive: Arc<dyn ArchiveStore>,
        reporter: Reporter,
    ) -> Self {
        Self {
            selector: Selector::new(active.clone()),
            fetcher: Fetcher::new(active.clone(), config.fetch_chunk_size, config.fetch_page_size),
            archiver: Archiver::new(archive, config.archive_batch_size),
            evictor: Evictor::new(active),
            reporter,
            config,
        }
    }

    pub fn config(&self) -> &ArchivalConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<RunSummary> {
        self.run_at(Utc::now()).await
    }

    /// Runs with cutoffs computed relative to `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let criteria = SelectionCriteria::at(now, self.config.windows());
        let mut report = RunReport::begin(run_id, now, &criteria);
        report.dry_run = self.config.dry_run;

        let span = info_span!("archival_run", run_id = %run_id, date = %report.date_key());
        self.execute(report, criteria).instrument(span).await
    }

    async fn execute(&self, mut report: RunReport, criteria: SelectionCriteria) -> Result<RunSummary> {
        let start = Instant::now();
        metrics().runs_started.inc();

        info!(
            registration_cutoff = %criteria.registration_cutoff,
            activity_cutoff = %criteria.activity_cutoff,
            dry_run = self.config.dry_run,
            "Starting archival run"
        );

        let moved = self.move_stale(&mut report, &criteria).await;
        report.finished_at = report.started_at
            + chrono::Duration::from_std(start.elapsed())
                .unwrap_or_else(|_| chrono::Duration::zero());
        metrics()
            .run_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        let eviction_error = match moved {
            Ok(eviction_error) => eviction_error,
            Err(err) => {
                error!(
                    stage = %err.stage(),
                    code = err.error_code(),
                    error = %err,
                    "Archival run aborted, nothing evicted"
                );
                if let Error::ArchiveWrite { confirmed, .. } = &err {
                    report.archived_records_count = *confirmed;
                }
                report.fail(&err);
                metrics().runs_failed.inc();
                self.deliver(&report).await;
                return Err(err);
            }
        };

        let finished_secs = report.finished_at.timestamp().max(0) as u64;
        match report.status {
            RunStatus::NoOp => {
                metrics().runs_noop.inc();
                metrics().last_success_epoch_secs.set(finished_secs);
            }
            RunStatus::Completed => {
                metrics().runs_completed.inc();
                metrics().last_success_epoch_secs.set(finished_secs);
            }
            RunStatus::EvictionIncomplete => {
                report.error = eviction_error.as_ref().map(Into::into);
                metrics().runs_eviction_incomplete.inc();
            }
            RunStatus::Failed => metrics().runs_failed.inc(),
        }

        let report_delivery = self.deliver(&report).await;
        let summary = RunSummary {
            report,
            report_delivery,
            eviction_error,
        };

        info!(
            status = summary.status().as_str(),
            selected = summary.report.selected_users_count,
            archived_users = summary.report.archived_users_count,
            evicted = summary.report.evicted_records_count,
            latency_ms = %start.elapsed().as_millis(),
            "Archival run finished"
        );
        tracing::debug!(metrics = ?metrics().snapshot(), "Metrics after run");

        Ok(summary)
    }

    /// Dry-run reports are logged only, so they never replace the durable
    /// report of a real run on the same date.
    async fn deliver(&self, report: &RunReport) -> ReportDelivery {
        if !self.config.dry_run {
            return self.reporter.publish(report).await;
        }

        match report.to_json_pretty() {
            Ok(body) => info!(report = %body, "Dry run report, not delivered to sinks"),
            Err(e) => error!(error = %e, "Failed to serialize dry run report"),
        }
        ReportDelivery::default()
    }

    /// Runs the stages, filling `report` as they complete. Returns the
    /// eviction error when eviction was the only stage that failed.
    async fn move_stale(
        &self,
        report: &mut RunReport,
        criteria: &SelectionCriteria,
    ) -> Result<Option<Error>> {
        let eligible = self.selector.select(criteria).await?;
        report.selected_users_count = eligible.len();

        if eligible.is_empty() {
            info!("No users qualify for archival");
            return Ok(None);
        }

        let records = self.fetcher.fetch(&eligible).await?;
        report.fetched_records_count = records.len();

        if self.config.dry_run {
            info!(
                users = eligible.len(),
                records = records.len(),
                "Dry run, nothing archived or evicted"
            );
            return Ok(None);
        }

        let outcome = self.archiver.archive(&records).await?;
        let archived_users = fully_confirmed_users(&records, &outcome.confirmed);

        report.archived_records_count = outcome.confirmed.len();
        report.unconfirmed_records_count = records.len().saturating_sub(outcome.confirmed.len());
        report.archived_users_count = archived_users.len();
        if self.config.include_user_ids {
            report.archived_user_ids = Some(archived_users);
        }

        match self.evictor.evict(&outcome.confirmed).await {
            Ok(evicted) => {
                report.evicted_records_count = evicted;
                report.status = RunStatus::Completed;
                Ok(None)
            }
            Err(err) => {
                report.status = RunStatus::EvictionIncomplete;
                Ok(Some(err))
            }
        }
    }
}

/// Users all of whose fetched records were confirmed, sorted.
fn fully_confirmed_users(records: &[ActivityRecord], confirmed: &[String]) -> Vec<String> {
    let confirmed: HashSet<&str> = confirmed.iter().map(String::as_str).collect();
    let mut users: BTreeMap<&str, bool> = BTreeMap::new();

    for record in records {
        let ok = confirmed.contains(record.record_id.as_str());
        users
            .entry(record.user_id.as_str())
            .and_modify(|all| *all &= ok)
            .or_insert(ok);
    }

    users
        .into_iter()
        .filter(|(_, all)| *all)
        .map(|(user, _)| user.to_string())
        .collect()
}
