//! ClickHouse table schemas.
//!
//! - Timestamps are DateTime64(3), carried as epoch milliseconds in rows
//! - The archive is a ReplacingMergeTree keyed by `record_id`, so inserting
//!   a record twice converges to one row (read with `FINAL`)
//! - Reports are keyed by run date, the latest `finished_at` wins

use crate::config::ClickHouseConfig;

/// SQL for creating the database.
pub fn create_database(config: &ClickHouseConfig) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", config.database)
}

/// SQL for creating the active per-event table.
///
/// Registration metadata is flattened out of the embedded user info.
pub fn create_active_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    record_id String,
    user_id String,
    event_type LowCardinality(String),
    event_time DateTime64(3),
    registration_date DateTime64(3),
    data String
)
ENGINE = MergeTree()
ORDER BY (user_id, record_id)
SETTINGS index_granularity = 8192
"#
    )
}

/// SQL for creating the archive table.
///
/// Same columns as the active table plus `archived_at`, the version column.
pub fn create_archive_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    record_id String,
    user_id String,
    event_type LowCardinality(String),
    event_time DateTime64(3),
    registration_date DateTime64(3),
    data String,
    archived_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(archived_at)
ORDER BY record_id
SETTINGS index_granularity = 8192
"#
    )
}

/// SQL for creating the run report table.
pub fn create_report_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    date String,
    run_id String,
    status LowCardinality(String),
    archived_users_count UInt64,
    evicted_records_count UInt64,
    finished_at DateTime64(3),
    body String
)
ENGINE = ReplacingMergeTree(finished_at)
ORDER BY date
"#
    )
}

/// SQL for creating the login outbox table.
pub fn create_outbox_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    login_id String,
    username String,
    event_type LowCardinality(String),
    event_time DateTime64(3),
    status LowCardinality(String) DEFAULT 'pending'
)
ENGINE = MergeTree()
ORDER BY login_id
"#
    )
}

/// All DDL statements in dependency order.
pub fn all_tables(config: &ClickHouseConfig) -> Vec<String> {
    vec![
        create_database(config),
        create_active_table(&config.qualified(&config.active_table)),
        create_archive_table(&config.qualified(&config.archive_table)),
        create_report_table(&config.qualified(&config.report_table)),
        create_outbox_table(&config.qualified(&config.outbox_table)),
    ]
}
