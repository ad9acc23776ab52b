//! Store contracts consumed by the archival pipeline.
//!
//! The job only needs a handful of primitives from each store, so backends
//! (ClickHouse in production, in-memory in tests) implement these traits
//! and the pipeline never sees a query language.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::records::{ActivityRecord, EntityAggregate};
use crate::report::RunReport;
use crate::selection::SelectionCriteria;

/// The live store users are archived out of.
#[async_trait]
pub trait ActiveStore: Send + Sync {
    /// Runs the read-only eligibility aggregation.
    async fn select_eligible(&self, criteria: &SelectionCriteria)
        -> StoreResult<Vec<EntityAggregate>>;

    /// Reads one page of records for the given users, ordered by
    /// `record_id`, strictly after `after` when set.
    async fn fetch_page(
        &self,
        user_ids: &[String],
        after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ActivityRecord>>;

    /// Deletes exactly the given records. Returns how many were removed.
    async fn delete_records(&self, record_ids: &[String]) -> StoreResult<u64>;

    /// Backend name (for logging).
    fn backend_name(&self) -> &'static str;
}

/// A record the archive refused in an otherwise successful bulk write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub record_id: String,
    pub reason: String,
}

/// Per-item result of a bulk upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub confirmed: Vec<String>,
    pub rejected: Vec<RejectedRecord>,
}

impl UpsertOutcome {
    /// Outcome for a backend that confirms a whole batch or fails it.
    pub fn all_confirmed(records: &[ActivityRecord]) -> Self {
        Self {
            confirmed: records.iter().map(|r| r.record_id.clone()).collect(),
            rejected: Vec::new(),
        }
    }

    pub fn merge(&mut self, other: UpsertOutcome) {
        self.confirmed.extend(other.confirmed);
        self.rejected.extend(other.rejected);
    }
}

/// The archive users are moved into. Writes must be upserts keyed by
/// `record_id`.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn upsert(&self, records: &[ActivityRecord]) -> StoreResult<UpsertOutcome>;

    fn backend_name(&self) -> &'static str;
}

/// Durable destination for run reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Writes the report, replacing any report for the same date.
    /// Returns the location written.
    async fn write(&self, report: &RunReport) -> StoreResult<String>;

    fn sink_name(&self) -> &'static str;
}
