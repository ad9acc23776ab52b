//! Report sink writing one row per run date.

use archive_core::{ReportSink, RunReport, StoreResult};
use async_trait::async_trait;

use crate::active::store_error;
use crate::client::ClickHouseClient;
use crate::rows::ReportRow;

/// Writes reports into `archive_reports`. Rows for the same date replace
/// each other on merge, newest `finished_at` wins.
#[derive(Clone)]
pub struct ClickHouseReportSink {
    client: ClickHouseClient,
}

impl ClickHouseReportSink {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    /// Latest report written for a date.
    pub async fn report_for(&self, date: &str) -> StoreResult<Option<RunReport>> {
        let sql = format!(
            "SELECT date, run_id, status, archived_users_count, evicted_records_count, finished_at, body \
             FROM {} FINAL WHERE date = ?",
            self.client.report_table()
        );
        let row: Option<ReportRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(date)
            .fetch_optional()
            .await
            .map_err(|e| store_error("report lookup", e))?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.body)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ReportSink for ClickHouseReportSink {
    async fn write(&self, report: &RunReport) -> StoreResult<String> {
        let table = self.client.report_table();
        let row = ReportRow {
            date: report.date_key(),
            run_id: report.run_id.to_string(),
            status: report.status.as_str().to_string(),
            archived_users_count: report.archived_users_count as u64,
            evicted_records_count: report.evicted_records_count,
            finished_at: report.finished_at.timestamp_millis(),
            body: serde_json::to_string(report)?,
        };

        let mut insert = self
            .client
            .inner()
            .insert(&table)
            .map_err(|e| store_error("insert", e))?;
        insert
            .write(&row)
            .await
            .map_err(|e| store_error("write", e))?;
        insert.end().await.map_err(|e| store_error("end", e))?;

        Ok(format!("{}/{}", table, row.date))
    }

    fn sink_name(&self) -> &'static str {
        "clickhouse"
    }
}
