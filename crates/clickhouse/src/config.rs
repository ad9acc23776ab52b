//! ClickHouse configuration.

use serde::{Deserialize, Serialize};

/// ClickHouse client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// ClickHouse HTTP URL
    pub url: String,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Username (optional)
    pub username: Option<String>,
    /// Password (optional)
    pub password: Option<String>,
    /// Live per-event table users are archived out of
    #[serde(default = "default_active_table")]
    pub active_table: String,
    /// Archive table, one row per archived record
    #[serde(default = "default_archive_table")]
    pub archive_table: String,
    /// Run report table
    #[serde(default = "default_report_table")]
    pub report_table: String,
    /// Login outbox table drained by the relay
    #[serde(default = "default_outbox_table")]
    pub outbox_table: String,
    /// Server-side query time limit in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database() -> String {
    "analytics".to_string()
}

fn default_active_table() -> String {
    "user_events".to_string()
}

fn default_archive_table() -> String {
    "archived_users".to_string()
}

fn default_report_table() -> String {
    "archive_reports".to_string()
}

fn default_outbox_table() -> String {
    "user_logins".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: default_database(),
            username: None,
            password: None,
            active_table: default_active_table(),
            archive_table: default_archive_table(),
            report_table: default_report_table(),
            outbox_table: default_outbox_table(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClickHouseConfig {
    /// Returns `database.table`.
    pub fn qualified(&self, table: &str) -> String {
        format!("{}.{}", self.database, table)
    }
}
