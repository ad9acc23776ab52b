//! Redpanda publisher for the login outbox relay.

pub mod config;
pub mod health;
pub mod producer;

pub use config::*;
pub use producer::*;
