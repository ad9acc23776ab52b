//! Eligibility rules for archival.
//!
//! A user is eligible when both hold, inclusive at the boundary:
//! - the latest registration date on any of its records is at or before
//!   the registration cutoff
//! - the latest event time across all of its records is at or before the
//!   activity cutoff
//!
//! Stores that can push the aggregation down (ClickHouse) run the same
//! three stages as a single query; [`aggregate_eligible`] is the in-process
//! form used by in-memory backends.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::records::{ActivityRecord, EntityAggregate};

/// Default registration staleness window in days.
pub const DEFAULT_REGISTRATION_STALENESS_DAYS: u32 = 30;

/// Default inactivity window in days.
pub const DEFAULT_ACTIVITY_INACTIVITY_DAYS: u32 = 14;

/// The two independent staleness windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessWindows {
    pub registration: Duration,
    pub activity: Duration,
}

impl StalenessWindows {
    pub fn from_days(registration_days: u32, activity_days: u32) -> Self {
        Self {
            registration: Duration::days(i64::from(registration_days)),
            activity: Duration::days(i64::from(activity_days)),
        }
    }
}

impl Default for StalenessWindows {
    fn default() -> Self {
        Self::from_days(
            DEFAULT_REGISTRATION_STALENESS_DAYS,
            DEFAULT_ACTIVITY_INACTIVITY_DAYS,
        )
    }
}

/// Absolute cutoffs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub registration_cutoff: DateTime<Utc>,
    pub activity_cutoff: DateTime<Utc>,
}

impl SelectionCriteria {
    /// Computes cutoffs relative to `now`.
    pub fn at(now: DateTime<Utc>, windows: StalenessWindows) -> Self {
        Self {
            registration_cutoff: now - windows.registration,
            activity_cutoff: now - windows.activity,
        }
    }

    /// Stage 1: does this record nominate its user as a candidate.
    pub fn nominates(&self, record: &ActivityRecord) -> bool {
        record.registration_date() <= self.registration_cutoff
    }

    /// Stage 3: does the aggregate over all of a candidate's records qualify.
    pub fn qualifies(&self, aggregate: &EntityAggregate) -> bool {
        aggregate.latest_registration <= self.registration_cutoff
            && aggregate.last_event <= self.activity_cutoff
    }
}

/// Runs filter → group/max → filter over a set of records.
///
/// Output is sorted by user id.
pub fn aggregate_eligible<'a, I>(records: I, criteria: &SelectionCriteria) -> Vec<EntityAggregate>
where
    I: IntoIterator<Item = &'a ActivityRecord>,
    I::IntoIter: Clone,
{
    let records = records.into_iter();

    let candidates: BTreeSet<&str> = records
        .clone()
        .filter(|r| criteria.nominates(r))
        .map(|r| r.user_id.as_str())
        .collect();

    let mut groups: BTreeMap<&str, EntityAggregate> = BTreeMap::new();
    for record in records.filter(|r| candidates.contains(r.user_id.as_str())) {
        let registration = record.registration_date();
        groups
            .entry(record.user_id.as_str())
            .and_modify(|agg| {
                agg.last_event = agg.last_event.max(record.event_time);
                agg.earliest_registration = agg.earliest_registration.min(registration);
                agg.latest_registration = agg.latest_registration.max(registration);
                agg.record_count += 1;
            })
            .or_insert_with(|| EntityAggregate {
                user_id: record.user_id.clone(),
                last_event: record.event_time,
                earliest_registration: registration,
                latest_registration: registration,
                record_count: 1,
            });
    }

    groups
        .into_values()
        .filter(|agg| criteria.qualifies(agg))
        .collect()
}
