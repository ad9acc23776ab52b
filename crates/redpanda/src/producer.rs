//! Outbox publisher using rskafka.

use crate::config::RedpandaConfig;
use archive_core::{EventPublisher, OutboxMessage, OutboxRow, StoreError, StoreResult};
use async_trait::async_trait;
use rskafka::client::{
    partition::{Compression, PartitionClient, UnknownTopicHandling},
    ClientBuilder,
};
use rskafka::record::Record;
use std::collections::BTreeMap;
use std::sync::Arc;
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Maps a configured compression name to the codec.
pub fn compression_from_name(name: &str) -> Compression {
    match name {
        "gzip" => Compression::Gzip,
        "snappy" => Compression::Snappy,
        "lz4" => Compression::Lz4,
        "zstd" => Compression::Zstd,
        _ => Compression::NoCompression,
    }
}

/// Builds the record for an outbox row, keyed by `login_id`.
pub fn to_record(row: &OutboxRow) -> StoreResult<Record> {
    let payload = serde_json::to_vec(&OutboxMessage::from(row))?;
    Ok(Record {
        key: Some(row.login_id.clone().into_bytes()),
        value: Some(payload),
        headers: BTreeMap::new(),
        timestamp: row.event_time,
    })
}

/// Publishes outbox rows to a single topic partition.
pub struct Producer {
    config: RedpandaConfig,
    /// Cached partition client
    client: RwLock<Option<Arc<PartitionClient>>>,
}

impl Producer {
    pub fn new(config: RedpandaConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &RedpandaConfig {
        &self.config
    }

    /// Gets or creates the partition client.
    async fn get_client(&self) -> StoreResult<Arc<PartitionClient>> {
        {
            let client = self.client.read().await;
            if let Some(ref c) = *client {
                return Ok(c.clone());
            }
        }

        let client = ClientBuilder::new(vec![self.config.broker_string()])
            .build()
            .await
            .map_err(|e| StoreError::connection(format!("Failed to connect: {}", e)))?;

        let partition_client = client
            .partition_client(
                self.config.topic.clone(),
                self.config.partition,
                UnknownTopicHandling::Retry,
            )
            .await
            .map_err(|e| {
                StoreError::connection(format!("Failed to get partition client: {}", e))
            })?;

        let partition_client = Arc::new(partition_client);
        *self.client.write().await = Some(partition_client.clone());

        Ok(partition_client)
    }

    /// Drops the cached client so the next publish reconnects.
    async fn reset_client(&self) {
        *self.client.write().await = None;
    }
}

#[async_trait]
impl EventPublisher for Producer {
    /// Produces all rows in one request. The broker acknowledges the whole
    /// request or none of it.
    async fn publish(&self, rows: &[OutboxRow]) -> StoreResult<Vec<String>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let start = std::time::Instant::now();
        let records = rows.iter().map(to_record).collect::<StoreResult<Vec<_>>>()?;
        let client = self.get_client().await?;

        match client
            .produce(records, compression_from_name(&self.config.compression))
            .await
        {
            Ok(_offsets) => {
                metrics().relay_rows_published.inc_by(rows.len() as u64);
                debug!(
                    topic = %self.config.topic,
                    count = rows.len(),
                    latency_ms = %start.elapsed().as_millis(),
                    "Published outbox rows"
                );
                Ok(rows.iter().map(|r| r.login_id.clone()).collect())
            }
            Err(e) => {
                error!(topic = %self.config.topic, "Failed to publish outbox rows: {}", e);
                self.reset_client().await;
                Err(StoreError::write(format!("Failed to produce: {}", e)))
            }
        }
    }
}
