//! ClickHouse health checks and schema bootstrap.

use crate::client::ClickHouseClient;
use archive_core::StoreResult;
use tracing::{debug, error};

use crate::active::store_error;

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
    }
}

/// Creates the database and tables if missing.
pub async fn init_schema(client: &ClickHouseClient) -> StoreResult<()> {
    use crate::schema::all_tables;

    // The database may not exist yet, so DDL runs unbound.
    let server = client.server();
    for ddl in all_tables(client.config()) {
        server
            .query(&ddl)
            .execute()
            .await
            .map_err(|e| store_error("DDL", e))?;
    }

    debug!("ClickHouse schema initialized");
    Ok(())
}
