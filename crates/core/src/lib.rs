//! Core types, selection rules, and store contracts for the archival job.

pub mod config;
pub mod error;
pub mod outbox;
pub mod records;
pub mod report;
pub mod selection;
pub mod store;

pub use config::*;
pub use error::{Error, Result, Stage, StoreError, StoreResult};
pub use outbox::*;
pub use records::*;
pub use report::*;
pub use selection::*;
pub use store::*;
