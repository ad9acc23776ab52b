//! Login outbox stored in ClickHouse.

use archive_core::{OutboxRow, OutboxSource, StoreResult};
use async_trait::async_trait;

use crate::active::store_error;
use crate::client::ClickHouseClient;
use crate::rows::OutboxTableRow;

/// Outbox over `user_logins`.
#[derive(Clone)]
pub struct ClickHouseOutbox {
    client: ClickHouseClient,
}

impl ClickHouseOutbox {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    /// Appends rows to the outbox (seeding and tests).
    pub async fn enqueue(&self, rows: &[OutboxRow]) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let table = self.client.outbox_table();
        let mut insert = self
            .client
            .inner()
            .insert(&table)
            .map_err(|e| store_error("insert", e))?;
        for row in rows {
            insert
                .write(&OutboxTableRow::from(row))
                .await
                .map_err(|e| store_error("write", e))?;
        }
        insert.end().await.map_err(|e| store_error("end", e))?;
        Ok(rows.len())
    }
}

#[async_trait]
impl OutboxSource for ClickHouseOutbox {
    async fn fetch_pending(&self, limit: usize) -> StoreResult<Vec<OutboxRow>> {
        let sql = format!(
            "SELECT login_id, username, event_type, event_time, status \
             FROM {} WHERE status = 'pending' ORDER BY event_time, login_id LIMIT ?",
            self.client.outbox_table()
        );
        let rows: Vec<OutboxTableRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(limit as u64)
            .fetch_all()
            .await
            .map_err(|e| store_error("fetch pending", e))?;

        Ok(rows.into_iter().map(OutboxRow::from).collect())
    }

    async fn mark_delivered(&self, login_id: &str) -> StoreResult<bool> {
        let table = self.client.outbox_table();

        let pending: u64 = self
            .client
            .inner()
            .query(&format!(
                "SELECT count() FROM {} WHERE login_id = ? AND status = 'pending'",
                table
            ))
            .bind(login_id)
            .fetch_one()
            .await
            .map_err(|e| store_error("pending lookup", e))?;

        if pending == 0 {
            return Ok(false);
        }

        self.client
            .synchronous_mutations()
            .query(&format!(
                "ALTER TABLE {} UPDATE status = 'delivered' WHERE login_id = ? AND status = 'pending'",
                table
            ))
            .bind(login_id)
            .execute()
            .await
            .map_err(|e| store_error("mark delivered", e))?;

        Ok(true)
    }
}
