//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use clickhouse::Client;
use tracing::info;

fn server_client(config: &ClickHouseConfig) -> Client {
    let mut client = Client::default()
        .with_url(&config.url)
        .with_option("max_execution_time", config.timeout_secs.to_string());

    if let Some(ref user) = config.username {
        client = client.with_user(user);
    }

    if let Some(ref pass) = config.password {
        client = client.with_password(pass);
    }

    client
}

/// ClickHouse client wrapper shared by all stores.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Self {
        let client = server_client(&config).with_database(&config.database);

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Self {
            inner: client,
            config,
        }
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Client whose mutations (`ALTER ... DELETE/UPDATE`) return only once
    /// applied on all replicas.
    pub fn synchronous_mutations(&self) -> Client {
        self.inner.clone().with_option("mutations_sync", "2")
    }

    /// Client not bound to the configured database, for bootstrapping it.
    pub fn server(&self) -> Client {
        server_client(&self.config)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    pub fn active_table(&self) -> String {
        self.config.qualified(&self.config.active_table)
    }

    pub fn archive_table(&self) -> String {
        self.config.qualified(&self.config.archive_table)
    }

    pub fn report_table(&self) -> String {
        self.config.qualified(&self.config.report_table)
    }

    pub fn outbox_table(&self) -> String {
        self.config.qualified(&self.config.outbox_table)
    }
}
