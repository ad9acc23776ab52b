//! ClickHouse-backed stores for the archival job.

pub mod active;
pub mod archive;
pub mod client;
pub mod config;
pub mod health;
pub mod outbox;
pub mod reports;
pub mod rows;
pub mod schema;

pub use active::ClickHouseActiveStore;
pub use archive::ClickHouseArchiveStore;
pub use client::*;
pub use config::*;
pub use outbox::ClickHouseOutbox;
pub use reports::ClickHouseReportSink;
