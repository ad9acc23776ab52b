//! Job configuration.
//!
//! Built once per invocation, validated, then handed to the job by value.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{Error, Result};
use crate::report::DATE_PLACEHOLDER;
use crate::selection::{
    StalenessWindows, DEFAULT_ACTIVITY_INACTIVITY_DAYS, DEFAULT_REGISTRATION_STALENESS_DAYS,
};

/// Archival job configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ArchivalConfig {
    /// Users registered at least this many days ago are candidates
    #[serde(default = "default_registration_window")]
    #[validate(range(min = 1))]
    pub registration_staleness_window_days: u32,
    /// Users with no event for at least this many days are candidates
    #[serde(default = "default_activity_window")]
    #[validate(range(min = 1))]
    pub activity_inactivity_window_days: u32,
    /// Report file path, `{date}` is replaced by the run date
    #[serde(default = "default_report_template")]
    #[validate(custom(function = "validate_path_template"))]
    pub report_sink_path_template: String,
    /// Also write reports into the ClickHouse report table
    #[serde(default)]
    pub report_to_clickhouse: bool,
    /// Emit archived user ids in the report
    #[serde(default = "default_true")]
    pub include_user_ids: bool,
    /// Users per fetch query
    #[serde(default = "default_fetch_chunk_size")]
    #[validate(range(min = 1))]
    pub fetch_chunk_size: usize,
    /// Records per fetch page
    #[serde(default = "default_fetch_page_size")]
    #[validate(range(min = 1))]
    pub fetch_page_size: usize,
    /// Records per archive upsert
    #[serde(default = "default_archive_batch_size")]
    #[validate(range(min = 1))]
    pub archive_batch_size: usize,
    /// Select and fetch only, move nothing
    #[serde(default)]
    pub dry_run: bool,
    /// Interval between runs in schedule mode (seconds)
    #[serde(default = "default_schedule_interval_secs")]
    #[validate(range(min = 1))]
    pub schedule_interval_secs: u64,
}

fn default_registration_window() -> u32 {
    DEFAULT_REGISTRATION_STALENESS_DAYS
}

fn default_activity_window() -> u32 {
    DEFAULT_ACTIVITY_INACTIVITY_DAYS
}

fn default_report_template() -> String {
    "/tmp/archive_report_users_{date}.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_fetch_chunk_size() -> usize {
    500
}

fn default_fetch_page_size() -> usize {
    5000
}

fn default_archive_batch_size() -> usize {
    1000
}

fn default_schedule_interval_secs() -> u64 {
    86_400
}

fn validate_path_template(template: &str) -> std::result::Result<(), ValidationError> {
    if template.contains(DATE_PLACEHOLDER) {
        return Ok(());
    }
    let mut err = ValidationError::new("missing_date_placeholder");
    err.message = Some(format!("template must contain {}", DATE_PLACEHOLDER).into());
    Err(err)
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            registration_staleness_window_days: default_registration_window(),
            activity_inactivity_window_days: default_activity_window(),
            report_sink_path_template: default_report_template(),
            report_to_clickhouse: false,
            include_user_ids: default_true(),
            fetch_chunk_size: default_fetch_chunk_size(),
            fetch_page_size: default_fetch_page_size(),
            archive_batch_size: default_archive_batch_size(),
            dry_run: false,
            schedule_interval_secs: default_schedule_interval_secs(),
        }
    }
}

impl ArchivalConfig {
    pub fn windows(&self) -> StalenessWindows {
        StalenessWindows::from_days(
            self.registration_staleness_window_days,
            self.activity_inactivity_window_days,
        )
    }

    /// Validates and returns the config.
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|e| Error::config(format!("archival: {}", e)))?;
        Ok(self)
    }
}

/// Outbox relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayConfig {
    /// Pending rows read per pass
    #[serde(default = "default_relay_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,
    /// Pause between passes when the outbox is drained (milliseconds)
    #[serde(default = "default_relay_idle_ms")]
    pub idle_interval_ms: u64,
}

fn default_relay_batch_size() -> usize {
    100
}

fn default_relay_idle_ms() -> u64 {
    500
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: default_relay_batch_size(),
            idle_interval_ms: default_relay_idle_ms(),
        }
    }
}

impl RelayConfig {
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|e| Error::config(format!("relay: {}", e)))?;
        Ok(self)
    }
}
