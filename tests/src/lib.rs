//! Shared support for the archival job's integration tests.

pub mod containers;
pub mod mocks;
