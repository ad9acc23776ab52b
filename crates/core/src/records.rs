//! Record types moved between the active store and the archive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registration metadata embedded in every activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub registration_date: DateTime<Utc>,
}

/// One event belonging to a user, as stored in the active store.
///
/// `record_id` is the natural unique key. The archive keys its copy by the
/// same value, so repeated upserts overwrite instead of duplicating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub record_id: String,
    pub user_id: String,
    pub event_type: String,
    pub event_time: DateTime<Utc>,
    pub user_info: UserInfo,
    /// Opaque JSON payload, carried verbatim.
    #[serde(default)]
    pub data: String,
}

impl ActivityRecord {
    pub fn registration_date(&self) -> DateTime<Utc> {
        self.user_info.registration_date
    }
}

/// A user selected for archival in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleEntity {
    pub user_id: String,
    /// Most recent event time across all of the user's records.
    pub last_event: DateTime<Utc>,
}

/// Per-user aggregate produced by the selection query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAggregate {
    pub user_id: String,
    pub last_event: DateTime<Utc>,
    pub earliest_registration: DateTime<Utc>,
    pub latest_registration: DateTime<Utc>,
    pub record_count: u64,
}

impl EntityAggregate {
    /// Whether the user's records disagree on the registration date.
    pub fn registration_varies(&self) -> bool {
        self.earliest_registration != self.latest_registration
    }

    pub fn into_eligible(self) -> EligibleEntity {
        EligibleEntity {
            user_id: self.user_id,
            last_event: self.last_event,
        }
    }
}
