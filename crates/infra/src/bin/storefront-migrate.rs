//! Applies the storefront schema to the database named by
//! `STOREFRONT_DATABASE_URL`.

use anyhow::Context;
use tracing::info;

use storefront_infra::{PostgresStore, StorefrontConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = StorefrontConfig::from_env().context("loading configuration")?;
    let store = PostgresStore::connect(&config)
        .await
        .context("connecting to the storefront database")?;
    store.migrate().await.context("applying the storefront schema")?;

    info!(max_connections = config.max_connections, "storefront database is up to date");
    Ok(())
}
