//! Redpanda configuration.

use serde::{Deserialize, Serialize};

/// Redpanda publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    /// Topic login events are published to
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Partition written to
    #[serde(default)]
    pub partition: i32,
    /// Compression type (none, gzip, snappy, lz4, zstd)
    #[serde(default = "default_compression")]
    pub compression: String,
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_topic() -> String {
    "user_events".to_string()
}

fn default_compression() -> String {
    "lz4".to_string()
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: default_topic(),
            partition: 0,
            compression: default_compression(),
        }
    }
}

impl RedpandaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }
}
