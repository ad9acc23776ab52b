//! Active store backed by the ClickHouse per-event table.

use archive_core::{
    ActiveStore, ActivityRecord, EntityAggregate, SelectionCriteria, StoreError, StoreResult,
};
use async_trait::async_trait;
use tracing::debug;

use crate::client::ClickHouseClient;
use crate::rows::{ActivityRow, AggregateRow};

/// Maps a driver error to a store error, keeping connection failures distinct.
pub(crate) fn store_error(context: &str, err: clickhouse::error::Error) -> StoreError {
    match err {
        clickhouse::error::Error::Network(_) => {
            StoreError::connection(format!("{}: {}", context, err))
        }
        _ => StoreError::query(format!("{}: {}", context, err)),
    }
}

/// Eligibility aggregation as one read-only query.
///
/// The inner query nominates users with any record registered at or before
/// the cutoff; the outer query aggregates over all of their records and
/// keeps groups whose latest registration and latest event are both at or
/// before their cutoffs.
pub fn selection_sql(table: &str) -> String {
    format!(
        r#"
        SELECT
            user_id,
            max(event_time) AS last_event,
            min(registration_date) AS earliest_registration,
            max(registration_date) AS latest_registration,
            count() AS record_count
        FROM {table}
        WHERE user_id IN (
            SELECT DISTINCT user_id
            FROM {table}
            WHERE registration_date <= fromUnixTimestamp64Milli(?)
        )
        GROUP BY user_id
        HAVING latest_registration <= fromUnixTimestamp64Milli(?)
           AND last_event <= fromUnixTimestamp64Milli(?)
        ORDER BY user_id
        "#
    )
}

/// Keyset-paginated record fetch for a set of users.
pub fn fetch_page_sql(table: &str) -> String {
    format!(
        r#"
        SELECT
            record_id,
            user_id,
            event_type,
            event_time,
            registration_date,
            data
        FROM {table}
        WHERE user_id IN ?
          AND record_id > ?
        ORDER BY record_id
        LIMIT ?
        "#
    )
}

/// Active store over `user_events`.
#[derive(Clone)]
pub struct ClickHouseActiveStore {
    client: ClickHouseClient,
}

impl ClickHouseActiveStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    /// Inserts records into the active table (seeding and tests).
    pub async fn insert_records(&self, records: &[ActivityRecord]) -> StoreResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let table = self.client.active_table();
        let mut insert = self
            .client
            .inner()
            .insert(&table)
            .map_err(|e| store_error("insert", e))?;

        for record in records {
            insert
                .write(&ActivityRow::from(record))
                .await
                .map_err(|e| store_error("write", e))?;
        }

        insert.end().await.map_err(|e| store_error("end", e))?;
        Ok(records.len())
    }

    /// Counts live records of a user.
    pub async fn count_user_records(&self, user_id: &str) -> StoreResult<u64> {
        let sql = format!(
            "SELECT count() FROM {} WHERE user_id = ?",
            self.client.active_table()
        );
        self.client
            .inner()
            .query(&sql)
            .bind(user_id)
            .fetch_one::<u64>()
            .await
            .map_err(|e| store_error("count", e))
    }
}

#[async_trait]
impl ActiveStore for ClickHouseActiveStore {
    async fn select_eligible(
        &self,
        criteria: &SelectionCriteria,
    ) -> StoreResult<Vec<EntityAggregate>> {
        let registration_cutoff = criteria.registration_cutoff.timestamp_millis();
        let activity_cutoff = criteria.activity_cutoff.timestamp_millis();

        let rows: Vec<AggregateRow> = self
            .client
            .inner()
            .query(&selection_sql(&self.client.active_table()))
            .bind(registration_cutoff)
            .bind(registration_cutoff)
            .bind(activity_cutoff)
            .fetch_all()
            .await
            .map_err(|e| store_error("selection query", e))?;

        debug!(groups = rows.len(), "Selection query returned");
        Ok(rows.into_iter().map(EntityAggregate::from).collect())
    }

    async fn fetch_page(
        &self,
        user_ids: &[String],
        after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ActivityRecord>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Every record_id sorts after the empty string.
        let after = after.unwrap_or("");

        let rows: Vec<ActivityRow> = self
            .client
            .inner()
            .query(&fetch_page_sql(&self.client.active_table()))
            .bind(user_ids)
            .bind(after)
            .bind(limit as u64)
            .fetch_all()
            .await
            .map_err(|e| store_error("fetch page", e))?;

        Ok(rows.into_iter().map(ActivityRecord::from).collect())
    }

    async fn delete_records(&self, record_ids: &[String]) -> StoreResult<u64> {
        if record_ids.is_empty() {
            return Ok(0);
        }

        let table = self.client.active_table();

        let live: u64 = self
            .client
            .inner()
            .query(&format!("SELECT count() FROM {} WHERE record_id IN ?", table))
            .bind(record_ids)
            .fetch_one()
            .await
            .map_err(|e| store_error("count before delete", e))?;

        self.client
            .synchronous_mutations()
            .query(&format!("ALTER TABLE {} DELETE WHERE record_id IN ?", table))
            .bind(record_ids)
            .execute()
            .await
            .map_err(|e| store_error("delete", e))?;

        debug!(requested = record_ids.len(), deleted = live, "Deleted records");
        Ok(live)
    }

    fn backend_name(&self) -> &'static str {
        "clickhouse"
    }
}
