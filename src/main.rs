//! OpenSASE Marketplace - checkout and order fulfillment service

use std::sync::Arc;

use anyhow::Result;
use opensase_marketplace::{api::{self, AppState}, config::AppConfig, store::{MemoryCatalog, MemoryNotificationStore, MemoryOrderStore, PgStore}};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable; events will only be logged"); None }
        },
        None => None,
    };

    let state = match &config.database_url {
        Some(url) => {
            let store = Arc::new(PgStore::connect(url, config.db_max_connections).await?);
            AppState::new(store.clone(), store.clone(), store, &config, nats)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            AppState::new(Arc::new(MemoryCatalog::new()), Arc::new(MemoryOrderStore::new()), Arc::new(MemoryNotificationStore::new()), &config, nats)
        }
    };

    let app = api::router(state);
    tracing::info!("🚀 OpenSASE Marketplace listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
