//! In-memory store implementations for testing.
//!
//! Each mock implements the same trait as its ClickHouse or Redpanda
//! counterpart, so the job runs its production code paths against state the
//! test can inspect and fail on demand.

use archive_core::{
    aggregate_eligible, ActiveStore, ActivityRecord, ArchiveStore, DeliveryStatus,
    EntityAggregate, EventPublisher, OutboxRow, OutboxSource, RejectedRecord, ReportSink,
    RunReport, SelectionCriteria, StoreError, StoreResult, UpsertOutcome,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct ActiveState {
    records: BTreeMap<String, ActivityRecord>,
    fail_select: bool,
    fail_fetch: bool,
    fail_delete: bool,
    /// Extra groups returned by selection regardless of the records
    injected: Vec<EntityAggregate>,
    select_calls: usize,
    fetch_calls: usize,
    delete_calls: Vec<Vec<String>>,
}

/// Active store keyed by `record_id`.
#[derive(Clone, Default)]
pub struct MemoryActiveStore {
    state: Arc<Mutex<ActiveState>>,
}

impl MemoryActiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = ActivityRecord>) -> Self {
        let store = Self::new();
        store.insert(records);
        store
    }

    pub fn insert(&self, records: impl IntoIterator<Item = ActivityRecord>) {
        let mut state = self.state.lock();
        for record in records {
            state.records.insert(record.record_id.clone(), record);
        }
    }

    /// All live records, ordered by `record_id`.
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.state.lock().records.values().cloned().collect()
    }

    pub fn record_ids(&self) -> HashSet<String> {
        self.state.lock().records.keys().cloned().collect()
    }

    pub fn user_ids(&self) -> HashSet<String> {
        self.state
            .lock()
            .records
            .values()
            .map(|r| r.user_id.clone())
            .collect()
    }

    pub fn user_record_count(&self, user_id: &str) -> usize {
        self.state
            .lock()
            .records
            .values()
            .filter(|r| r.user_id == user_id)
            .count()
    }

    pub fn set_fail_select(&self, fail: bool) {
        self.state.lock().fail_select = fail;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.state.lock().fail_fetch = fail;
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.state.lock().fail_delete = fail;
    }

    /// Makes selection also return `aggregate`, as a misbehaving backend would.
    pub fn inject_aggregate(&self, aggregate: EntityAggregate) {
        self.state.lock().injected.push(aggregate);
    }

    pub fn select_calls(&self) -> usize {
        self.state.lock().select_calls
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().fetch_calls
    }

    /// Record id lists passed to every delete call.
    pub fn delete_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().delete_calls.clone()
    }
}

#[async_trait]
impl ActiveStore for MemoryActiveStore {
    async fn select_eligible(
        &self,
        criteria: &SelectionCriteria,
    ) -> StoreResult<Vec<EntityAggregate>> {
        let mut state = self.state.lock();
        state.select_calls += 1;
        if state.fail_select {
            return Err(StoreError::connection("mock active store unreachable"));
        }

        let mut groups = aggregate_eligible(state.records.values(), criteria);
        groups.extend(state.injected.iter().cloned());
        Ok(groups)
    }

    async fn fetch_page(
        &self,
        user_ids: &[String],
        after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ActivityRecord>> {
        let mut state = self.state.lock();
        state.fetch_calls += 1;
        if state.fail_fetch {
            return Err(StoreError::query("mock fetch failure"));
        }

        let users: HashSet<&str> = user_ids.iter().map(String::as_str).collect();
        Ok(state
            .records
            .values()
            .filter(|r| users.contains(r.user_id.as_str()))
            .filter(|r| after.map_or(true, |a| r.record_id.as_str() > a))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_records(&self, record_ids: &[String]) -> StoreResult<u64> {
        let mut state = self.state.lock();
        state.delete_calls.push(record_ids.to_vec());
        if state.fail_delete {
            return Err(StoreError::query("mock delete failure"));
        }

        let mut deleted = 0;
        for id in record_ids {
            if state.records.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
struct ArchiveState {
    records: BTreeMap<String, ActivityRecord>,
    fail: bool,
    /// Fail every call after this many successful ones
    fail_after: Option<usize>,
    reject: HashSet<String>,
    upsert_calls: usize,
    batch_sizes: Vec<usize>,
}

/// Archive keyed by `record_id`; upserts overwrite.
#[derive(Clone, Default)]
pub struct MemoryArchiveStore {
    state: Arc<Mutex<ArchiveState>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, records: impl IntoIterator<Item = ActivityRecord>) {
        let mut state = self.state.lock();
        for record in records {
            state.records.insert(record.record_id.clone(), record);
        }
    }

    pub fn records(&self) -> Vec<ActivityRecord> {
        self.state.lock().records.values().cloned().collect()
    }

    pub fn record_ids(&self) -> HashSet<String> {
        self.state.lock().records.keys().cloned().collect()
    }

    pub fn user_ids(&self) -> HashSet<String> {
        self.state
            .lock()
            .records
            .values()
            .map(|r| r.user_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.state.lock().fail = fail;
    }

    pub fn fail_after(&self, successful_calls: usize) {
        self.state.lock().fail_after = Some(successful_calls);
    }

    /// Makes upserts report `record_id` as rejected.
    pub fn reject(&self, record_id: &str) {
        self.state.lock().reject.insert(record_id.to_string());
    }

    pub fn clear_rejections(&self) {
        self.state.lock().reject.clear();
    }

    pub fn upsert_calls(&self) -> usize {
        self.state.lock().upsert_calls
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().batch_sizes.clone()
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn upsert(&self, records: &[ActivityRecord]) -> StoreResult<UpsertOutcome> {
        let mut state = self.state.lock();
        state.upsert_calls += 1;

        let over_limit = state
            .fail_after
            .is_some_and(|limit| state.upsert_calls > limit);
        if state.fail || over_limit {
            return Err(StoreError::write("mock archive failure"));
        }
        state.batch_sizes.push(records.len());

        let mut outcome = UpsertOutcome::default();
        for record in records {
            if state.reject.contains(&record.record_id) {
                outcome.rejected.push(RejectedRecord {
                    record_id: record.record_id.clone(),
                    reason: "mock rejection".into(),
                });
                continue;
            }
            state
                .records
                .insert(record.record_id.clone(), record.clone());
            outcome.confirmed.push(record.record_id.clone());
        }
        Ok(outcome)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
struct ReportState {
    by_date: BTreeMap<String, RunReport>,
    writes: usize,
    fail: bool,
}

/// Report sink addressed by date, like the file and ClickHouse sinks.
#[derive(Clone, Default)]
pub struct MemoryReportSink {
    state: Arc<Mutex<ReportState>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_for(&self, date: &str) -> Option<RunReport> {
        self.state.lock().by_date.get(date).cloned()
    }

    /// Most recently written report.
    pub fn latest(&self) -> Option<RunReport> {
        self.state
            .lock()
            .by_date
            .values()
            .max_by_key(|r| r.finished_at)
            .cloned()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.state.lock().fail = fail;
    }
}

#[async_trait]
impl ReportSink for MemoryReportSink {
    async fn write(&self, report: &RunReport) -> StoreResult<String> {
        let mut state = self.state.lock();
        state.writes += 1;
        if state.fail {
            return Err(StoreError::write("mock report sink failure"));
        }

        let date = report.date_key();
        state.by_date.insert(date.clone(), report.clone());
        Ok(format!("memory://{}", date))
    }

    fn sink_name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
struct OutboxState {
    rows: BTreeMap<String, OutboxRow>,
    fail_fetch: bool,
    mark_calls: Vec<String>,
}

/// Outbox with a conditional pending → delivered transition.
#[derive(Clone, Default)]
pub struct MemoryOutbox {
    state: Arc<Mutex<OutboxState>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = OutboxRow>) -> Self {
        let outbox = Self::new();
        {
            let mut state = outbox.state.lock();
            for row in rows {
                state.rows.insert(row.login_id.clone(), row);
            }
        }
        outbox
    }

    pub fn status(&self, login_id: &str) -> Option<DeliveryStatus> {
        self.state.lock().rows.get(login_id).map(|r| r.status)
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .rows
            .values()
            .filter(|r| r.status == DeliveryStatus::Pending)
            .count()
    }

    pub fn mark_calls(&self) -> Vec<String> {
        self.state.lock().mark_calls.clone()
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.state.lock().fail_fetch = fail;
    }
}

#[async_trait]
impl OutboxSource for MemoryOutbox {
    async fn fetch_pending(&self, limit: usize) -> StoreResult<Vec<OutboxRow>> {
        let state = self.state.lock();
        if state.fail_fetch {
            return Err(StoreError::connection("mock outbox unreachable"));
        }

        let mut pending: Vec<OutboxRow> = state
            .rows
            .values()
            .filter(|r| r.status == DeliveryStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.event_time
                .cmp(&b.event_time)
                .then_with(|| a.login_id.cmp(&b.login_id))
        });
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_delivered(&self, login_id: &str) -> StoreResult<bool> {
        let mut state = self.state.lock();
        state.mark_calls.push(login_id.to_string());

        match state.rows.get_mut(login_id) {
            Some(row) if row.status == DeliveryStatus::Pending => {
                row.status = DeliveryStatus::Delivered;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
struct PublisherState {
    sent: Vec<OutboxRow>,
    should_fail: bool,
    unacknowledged: HashSet<String>,
}

/// Publisher that captures rows in memory.
#[derive(Clone, Default)]
pub struct MockPublisher {
    state: Arc<Mutex<PublisherState>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row handed to the publisher, including unacknowledged ones.
    pub fn sent(&self) -> Vec<OutboxRow> {
        self.state.lock().sent.clone()
    }

    pub fn sent_count(&self, login_id: &str) -> usize {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|r| r.login_id == login_id)
            .count()
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.state.lock().should_fail = fail;
    }

    /// Sends `login_id` but withholds its acknowledgment.
    pub fn withhold_ack(&self, login_id: &str) {
        self.state.lock().unacknowledged.insert(login_id.to_string());
    }

    pub fn release_acks(&self) {
        self.state.lock().unacknowledged.clear();
    }
}

#[async_trait]
impl EventPublisher for MockPublisher {
    async fn publish(&self, rows: &[OutboxRow]) -> StoreResult<Vec<String>> {
        let mut state = self.state.lock();
        if state.should_fail {
            return Err(StoreError::connection("mock broker unreachable"));
        }

        state.sent.extend(rows.iter().cloned());
        Ok(rows
            .iter()
            .filter(|r| !state.unacknowledged.contains(&r.login_id))
            .map(|r| r.login_id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_fetch_page_is_keyset_ordered() {
        let now = fixtures::pinned_now();
        let store = MemoryActiveStore::with_records(fixtures::user_records("u1", 40, &[20, 21, 22], now));
        let users = vec!["u1".to_string()];

        let first = store.fetch_page(&users, None, 2).await.unwrap();
        assert_eq!(first.len(), 2);

        let rest = store
            .fetch_page(&users, Some(&first[1].record_id), 2)
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert!(rest[0].record_id > first[1].record_id);
    }

    #[tokio::test]
    async fn test_outbox_mark_is_conditional() {
        let outbox = MemoryOutbox::with_rows(vec![fixtures::login_row("l1", "alice", 0)]);

        assert!(outbox.mark_delivered("l1").await.unwrap());
        assert!(!outbox.mark_delivered("l1").await.unwrap());
        assert!(!outbox.mark_delivered("missing").await.unwrap());
        assert_eq!(outbox.status("l1"), Some(DeliveryStatus::Delivered));
    }
}
