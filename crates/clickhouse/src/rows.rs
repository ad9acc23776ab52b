//! Row types mapped to the ClickHouse tables.

use archive_core::{ActivityRecord, DeliveryStatus, EntityAggregate, OutboxRow, UserInfo};
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};

/// Converts epoch milliseconds back to a UTC timestamp.
///
/// Out-of-range values clamp to the epoch; DateTime64(3) cannot hold them.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Row of the active table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ActivityRow {
    pub record_id: String,
    pub user_id: String,
    pub event_type: String,
    pub event_time: i64, // DateTime64(3) as milliseconds
    pub registration_date: i64,
    pub data: String,
}

impl From<&ActivityRecord> for ActivityRow {
    fn from(record: &ActivityRecord) -> Self {
        Self {
            record_id: record.record_id.clone(),
            user_id: record.user_id.clone(),
            event_type: record.event_type.clone(),
            event_time: record.event_time.timestamp_millis(),
            registration_date: record.registration_date().timestamp_millis(),
            data: record.data.clone(),
        }
    }
}

impl From<ActivityRow> for ActivityRecord {
    fn from(row: ActivityRow) -> Self {
        Self {
            record_id: row.record_id,
            user_id: row.user_id,
            event_type: row.event_type,
            event_time: from_millis(row.event_time),
            user_info: UserInfo {
                registration_date: from_millis(row.registration_date),
            },
            data: row.data,
        }
    }
}

/// Row of the archive table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ArchivedRow {
    pub record_id: String,
    pub user_id: String,
    pub event_type: String,
    pub event_time: i64,
    pub registration_date: i64,
    pub data: String,
    pub archived_at: i64,
}

impl ArchivedRow {
    pub fn new(record: &ActivityRecord, archived_at: DateTime<Utc>) -> Self {
        let row = ActivityRow::from(record);
        Self {
            record_id: row.record_id,
            user_id: row.user_id,
            event_type: row.event_type,
            event_time: row.event_time,
            registration_date: row.registration_date,
            data: row.data,
            archived_at: archived_at.timestamp_millis(),
        }
    }

    /// The archived copy without archive metadata.
    pub fn into_record(self) -> ActivityRecord {
        ActivityRow {
            record_id: self.record_id,
            user_id: self.user_id,
            event_type: self.event_type,
            event_time: self.event_time,
            registration_date: self.registration_date,
            data: self.data,
        }
        .into()
    }
}

/// Per-user result of the eligibility aggregation.
#[derive(Debug, Clone, Row, Deserialize)]
pub struct AggregateRow {
    pub user_id: String,
    pub last_event: i64,
    pub earliest_registration: i64,
    pub latest_registration: i64,
    pub record_count: u64,
}

impl From<AggregateRow> for EntityAggregate {
    fn from(row: AggregateRow) -> Self {
        Self {
            user_id: row.user_id,
            last_event: from_millis(row.last_event),
            earliest_registration: from_millis(row.earliest_registration),
            latest_registration: from_millis(row.latest_registration),
            record_count: row.record_count,
        }
    }
}

/// Row of the report table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ReportRow {
    pub date: String,
    pub run_id: String,
    pub status: String,
    pub archived_users_count: u64,
    pub evicted_records_count: u64,
    pub finished_at: i64,
    /// Full report as JSON
    pub body: String,
}

/// Row of the login outbox table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct OutboxTableRow {
    pub login_id: String,
    pub username: String,
    pub event_type: String,
    pub event_time: i64,
    pub status: String,
}

impl From<&OutboxRow> for OutboxTableRow {
    fn from(row: &OutboxRow) -> Self {
        Self {
            login_id: row.login_id.clone(),
            username: row.username.clone(),
            event_type: row.event_type.clone(),
            event_time: row.event_time.timestamp_millis(),
            status: row.status.as_str().to_string(),
        }
    }
}

impl From<OutboxTableRow> for OutboxRow {
    fn from(row: OutboxTableRow) -> Self {
        let status = if row.status == DeliveryStatus::Delivered.as_str() {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Pending
        };
        Self {
            login_id: row.login_id,
            username: row.username,
            event_type: row.event_type,
            event_time: from_millis(row.event_time),
            status,
        }
    }
}
