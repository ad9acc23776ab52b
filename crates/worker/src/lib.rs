//! Archival pipeline and background workers.
//!
//! - Selector, Fetcher, Archiver, Evictor, Reporter (pipeline stages)
//! - ArchivalJob (orchestrator)
//! - JobScheduler (periodic trigger)
//! - RelayWorker (login outbox → Redpanda)

pub mod archiver;
pub mod evictor;
pub mod fetcher;
pub mod job;
pub mod relay;
pub mod reporter;
pub mod scheduler;
pub mod selector;

pub use archiver::Archiver;
pub use evictor::Evictor;
pub use fetcher::Fetcher;
pub use job::{ArchivalJob, RunSummary};
pub use relay::{RelayOutcome, RelayWorker};
pub use reporter::{FileReportSink, ReportDelivery, Reporter};
pub use scheduler::JobScheduler;
pub use selector::Selector;
