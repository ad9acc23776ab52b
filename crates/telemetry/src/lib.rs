//! Structured logging and in-process metrics for the archival job.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;
