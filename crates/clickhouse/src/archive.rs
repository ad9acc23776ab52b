//! Archive store backed by a ReplacingMergeTree keyed by `record_id`.

use archive_core::{ActivityRecord, ArchiveStore, StoreResult, UpsertOutcome};
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::active::store_error;
use crate::client::ClickHouseClient;
use crate::rows::ArchivedRow;

/// Archive store over `archived_users`.
///
/// A ClickHouse insert is accepted or rejected as a whole, so a successful
/// write confirms every record of the batch. Re-inserting a record creates
/// a newer version that replaces the older one on merge; reads use `FINAL`.
#[derive(Clone)]
pub struct ClickHouseArchiveStore {
    client: ClickHouseClient,
}

impl ClickHouseArchiveStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    /// Archived copies of a user's records, deduplicated.
    pub async fn archived_records(&self, user_id: &str) -> StoreResult<Vec<ActivityRecord>> {
        let sql = format!(
            "SELECT record_id, user_id, event_type, event_time, registration_date, data, archived_at \
             FROM {} FINAL WHERE user_id = ? ORDER BY record_id",
            self.client.archive_table()
        );
        let rows: Vec<ArchivedRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(user_id)
            .fetch_all()
            .await
            .map_err(|e| store_error("archived records", e))?;

        Ok(rows.into_iter().map(ArchivedRow::into_record).collect())
    }

    /// Number of distinct archived records.
    pub async fn count_records(&self) -> StoreResult<u64> {
        let sql = format!("SELECT count() FROM {} FINAL", self.client.archive_table());
        self.client
            .inner()
            .query(&sql)
            .fetch_one::<u64>()
            .await
            .map_err(|e| store_error("count archive", e))
    }
}

#[async_trait]
impl ArchiveStore for ClickHouseArchiveStore {
    async fn upsert(&self, records: &[ActivityRecord]) -> StoreResult<UpsertOutcome> {
        if records.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        let start = std::time::Instant::now();
        let archived_at = Utc::now();
        let table = self.client.archive_table();

        let mut insert = self
            .client
            .inner()
            .insert(&table)
            .map_err(|e| store_error("insert", e))?;

        for record in records {
            insert
                .write(&ArchivedRow::new(record, archived_at))
                .await
                .map_err(|e| store_error("write", e))?;
        }

        insert.end().await.map_err(|e| store_error("end", e))?;

        let elapsed = start.elapsed();
        debug!(
            count = records.len(),
            latency_ms = %elapsed.as_millis(),
            "Upserted records into archive"
        );

        Ok(UpsertOutcome::all_confirmed(records))
    }

    fn backend_name(&self) -> &'static str {
        "clickhouse"
    }
}
