//! Unified error types for the archival job.
//!
//! Error codes:
//! - ARCH_001: Selection failed (active store unreachable or aggregation failed)
//! - ARCH_002: Fetch failed
//! - ARCH_003: Archive write failed
//! - ARCH_004: Eviction failed after a confirmed archive write
//! - ARCH_005: Report write failed
//! - ARCH_006: Invalid configuration
//! - RELAY_001: Outbox relay failed

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for store backends.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Stage of an archival run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Select,
    Fetch,
    Archive,
    Evict,
    Report,
    Config,
    Relay,
}

impl Stage {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Select => "ARCH_001",
            Self::Fetch => "ARCH_002",
            Self::Archive => "ARCH_003",
            Self::Evict => "ARCH_004",
            Self::Report => "ARCH_005",
            Self::Config => "ARCH_006",
            Self::Relay => "RELAY_001",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Fetch => "fetch",
            Self::Archive => "archive",
            Self::Evict => "evict",
            Self::Report => "report",
            Self::Config => "config",
            Self::Relay => "relay",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by store backends (active store, archive store, report sinks, outbox).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }
}

/// Unified error type for the archival job.
#[derive(Debug, Error)]
pub enum Error {
    /// The eligibility aggregation could not run.
    #[error("[ARCH_001] selection failed: {0}")]
    Selection(#[source] StoreError),

    /// Records of selected users could not be read back.
    #[error("[ARCH_002] fetch failed: {0}")]
    Fetch(#[source] StoreError),

    /// A bulk upsert into the archive failed. Nothing was evicted.
    #[error("[ARCH_003] archive write failed after {confirmed} confirmed records: {source}")]
    ArchiveWrite {
        confirmed: usize,
        #[source]
        source: StoreError,
    },

    /// Archived records could not be removed from the active store.
    /// They remain duplicated in both stores until a later run evicts them.
    #[error("[ARCH_004] eviction failed, {pending} archived records still live: {source}")]
    Eviction {
        pending: usize,
        #[source]
        source: StoreError,
    },

    #[error("[ARCH_005] report write to {sink} failed: {source}")]
    Report {
        sink: String,
        #[source]
        source: StoreError,
    },

    #[error("[ARCH_006] invalid configuration: {0}")]
    Config(String),

    #[error("[RELAY_001] relay failed: {0}")]
    Relay(#[source] StoreError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn report(sink: impl Into<String>, source: StoreError) -> Self {
        Self::Report {
            sink: sink.into(),
            source,
        }
    }

    /// Stage the error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Selection(_) => Stage::Select,
            Self::Fetch(_) => Stage::Fetch,
            Self::ArchiveWrite { .. } => Stage::Archive,
            Self::Eviction { .. } => Stage::Evict,
            Self::Report { .. } => Stage::Report,
            Self::Config(_) => Stage::Config,
            Self::Relay(_) => Stage::Relay,
        }
    }

    /// Get the error code.
    pub fn error_code(&self) -> &'static str {
        self.stage().code()
    }

    /// Whether the error aborts the run before eviction.
    ///
    /// Eviction and report errors happen after the archive write is
    /// confirmed and never undo it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Eviction { .. } | Self::Report { .. })
    }
}
