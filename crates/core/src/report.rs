//! Run report written at the end of every archival run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Stage};
use crate::selection::SelectionCriteria;

/// Placeholder substituted with the run date in report locations.
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Date format used for report naming and the `date` field.
pub const REPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing qualified, or a dry run.
    NoOp,
    /// Everything archived was also evicted.
    Completed,
    /// Archive confirmed but some archived records are still live.
    EvictionIncomplete,
    /// Aborted before eviction.
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoOp => "no_op",
            Self::Completed => "completed",
            Self::EvictionIncomplete => "eviction_incomplete",
            Self::Failed => "failed",
        }
    }
}

/// Stage failure recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub code: String,
    pub message: String,
}

impl From<&Error> for StageFailure {
    fn from(err: &Error) -> Self {
        Self {
            stage: err.stage(),
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Audit report for one run.
///
/// Reports are addressed by `date`, so a second run on the same day
/// replaces the first one's report. Dry runs are logged, never delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub status: RunStatus,
    pub dry_run: bool,
    pub registration_cutoff: DateTime<Utc>,
    pub activity_cutoff: DateTime<Utc>,
    pub selected_users_count: usize,
    pub fetched_records_count: usize,
    pub archived_users_count: usize,
    pub archived_records_count: usize,
    pub unconfirmed_records_count: usize,
    pub evicted_records_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_user_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Starts an empty report for a run beginning at `started_at`.
    pub fn begin(run_id: Uuid, started_at: DateTime<Utc>, criteria: &SelectionCriteria) -> Self {
        Self {
            run_id,
            date: started_at.date_naive(),
            status: RunStatus::NoOp,
            dry_run: false,
            registration_cutoff: criteria.registration_cutoff,
            activity_cutoff: criteria.activity_cutoff,
            selected_users_count: 0,
            fetched_records_count: 0,
            archived_users_count: 0,
            archived_records_count: 0,
            unconfirmed_records_count: 0,
            evicted_records_count: 0,
            archived_user_ids: None,
            error: None,
            started_at,
            finished_at: started_at,
        }
    }

    /// Marks the report failed with the given error.
    pub fn fail(&mut self, err: &Error) {
        self.status = RunStatus::Failed;
        self.error = Some(StageFailure::from(err));
    }

    /// Run date formatted for report naming.
    pub fn date_key(&self) -> String {
        self.date.format(REPORT_DATE_FORMAT).to_string()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Renders a report location template for the given date.
pub fn render_report_location(template: &str, date: NaiveDate) -> String {
    template.replace(DATE_PLACEHOLDER, &date.format(REPORT_DATE_FORMAT).to_string())
}
