use anyhow::Context;
use parkspot_api::{app, AppState};
use parkspot_core::ParkingStore;
use parkspot_store::app_config::{Config, StoreBackend};
use parkspot_store::{DbClient, InMemoryParkingStore, PgParkingStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parkspot_api=debug,parkspot_booking=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting ParkSpot API on port {}", config.server.port);

    let lock_timeout = config.lifecycle.lock_timeout();
    let store: Arc<dyn ParkingStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PgParkingStore::new(db.pool.clone(), lock_timeout))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; all data is lost on shutdown");
            Arc::new(InMemoryParkingStore::with_lock_timeout(lock_timeout))
        }
    };

    let state = AppState::new(
        store,
        config.lifecycle.retry_policy(),
        config.events.channel_capacity,
    );
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
