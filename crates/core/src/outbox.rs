//! Outbox rows relayed to the event bus.
//!
//! Each row carries an explicit delivery status. A row is marked delivered
//! only after the bus acknowledged it, and the update is conditional on the
//! row's natural key and its `pending` status, so a redelivery never
//! re-marks anything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Delivery status of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
        }
    }
}

/// A login event waiting to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRow {
    pub login_id: String,
    pub username: String,
    pub event_type: String,
    pub event_time: DateTime<Utc>,
    #[serde(default)]
    pub status: DeliveryStatus,
}

/// Message published for an outbox row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub user: String,
    pub event: String,
    /// Seconds since the epoch, with millisecond precision.
    pub timestamp: f64,
}

impl From<&OutboxRow> for OutboxMessage {
    fn from(row: &OutboxRow) -> Self {
        Self {
            user: row.username.clone(),
            event: row.event_type.clone(),
            timestamp: row.event_time.timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// System of record holding outbox rows.
#[async_trait]
pub trait OutboxSource: Send + Sync {
    /// Oldest pending rows, at most `limit`.
    async fn fetch_pending(&self, limit: usize) -> StoreResult<Vec<OutboxRow>>;

    /// Flips one row from pending to delivered. Returns `false` when the
    /// row was not pending (already delivered or gone).
    async fn mark_delivered(&self, login_id: &str) -> StoreResult<bool>;
}

/// Downstream bus. Returns the `login_id`s it acknowledged.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, rows: &[OutboxRow]) -> StoreResult<Vec<String>>;
}
