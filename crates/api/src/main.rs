use std::sync::Arc;

use anyhow::Context;

use ledgerd_api::app::{self, AppServices};
use ledgerd_api::config::AppConfig;
use ledgerd_engine::OutboxRelay;
use ledgerd_events::BusClient;
use ledgerd_store::LedgerStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ledgerd_observability::init();

    let config = AppConfig::from_env();

    #[cfg(feature = "redis")]
    if let (Some(database_url), Some(redis_url)) =
        (config.store.url.clone(), config.bus.redis_url.clone())
    {
        return run_persistent(config, database_url, redis_url).await;
    }

    if config.store.url.is_some() {
        tracing::warn!(
            "DATABASE_URL is set but the binary was built without the 'redis' feature; \
             falling back to in-memory dev mode"
        );
    } else {
        tracing::warn!("no DATABASE_URL configured; using in-memory store and bus (dev mode)");
    }

    let app = app::build_in_memory(&config);
    serve(config, app.services, app.relay).await
}

#[cfg(feature = "redis")]
async fn run_persistent(
    config: AppConfig,
    database_url: String,
    redis_url: String,
) -> anyhow::Result<()> {
    use ledgerd_events::RedisBusClient;
    use ledgerd_store::{schema, PgLedgerStore};

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.store.max_connections)
        .connect(&database_url)
        .await
        .context("connecting to postgres")?;
    schema::init_schema(&pool).await.context("initializing schema")?;

    let isolation = config.isolation_level().map_err(anyhow::Error::msg)?;
    let store = Arc::new(PgLedgerStore::new(pool).with_isolation(isolation));
    let bus = Arc::new(RedisBusClient::new(&redis_url).context("connecting to redis")?);

    let (services, relay) = app::build_services(store, bus, &config);
    serve(config, services, relay).await
}

async fn serve<S, B>(
    config: AppConfig,
    services: Arc<AppServices<S>>,
    relay: Arc<OutboxRelay<S, B>>,
) -> anyhow::Result<()>
where
    S: LedgerStore,
    B: BusClient + 'static,
{
    let snapshot_config = config.snapshot_worker_config().map_err(anyhow::Error::msg)?;

    let relay_handle = relay.spawn();
    let snapshot_handle = services.snapshots.clone().spawn_daily(snapshot_config);

    let router = app::build_router(services);
    let listener = tokio::net::TcpListener::bind(&config.http.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.http.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("http server stopped; draining workers");
    relay_handle.shutdown().await;
    snapshot_handle.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
