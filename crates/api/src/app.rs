//! Service wiring and router construction.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Extension;
use axum::routing::get;
use axum::Router;

use ledgerd_core::{Clock, LedgerResult, SystemClock};
use ledgerd_engine::{
    AccountAdmin, BalanceEngine, LedgerPoster, OutboxRelay, Reverser, SnapshotMaker,
    with_deadline,
};
use ledgerd_events::{BusClient, InMemoryBusClient};
use ledgerd_store::{InMemoryLedgerStore, LedgerStore};

use crate::config::AppConfig;
use crate::routes;

/// Everything the handlers need, wired once at startup.
pub struct AppServices<S: LedgerStore> {
    pub store: Arc<S>,
    pub clock: Arc<dyn Clock>,
    pub poster: LedgerPoster<S>,
    pub reverser: Reverser<S>,
    pub balances: BalanceEngine<S>,
    pub admin: AccountAdmin<S>,
    pub snapshots: Arc<SnapshotMaker<S>>,
    request_deadline: Duration,
}

impl<S: LedgerStore> AppServices<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, request_deadline: Duration) -> Self {
        Self {
            poster: LedgerPoster::new(store.clone(), clock.clone()),
            reverser: Reverser::new(store.clone(), clock.clone()),
            balances: BalanceEngine::new(store.clone(), clock.clone()),
            admin: AccountAdmin::new(store.clone(), clock.clone()),
            snapshots: Arc::new(SnapshotMaker::new(store.clone(), clock.clone())),
            store,
            clock,
            request_deadline,
        }
    }

    /// Run an operation under the per-request deadline; expiry drops the
    /// in-flight store transaction (rolling it back) and surfaces
    /// `DeadlineExceeded`.
    pub async fn run<T>(&self, operation: impl Future<Output = LedgerResult<T>>) -> LedgerResult<T> {
        with_deadline(self.request_deadline, operation).await
    }
}

pub fn build_router<S: LedgerStore>(services: Arc<AppServices<S>>) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_router::<S>())
        .route("/actuator/health", get(routes::health::health))
        .layer(Extension(services))
}

/// Dev/test wiring: in-memory store and bus, system clock.
pub struct InMemoryApp {
    pub services: Arc<AppServices<InMemoryLedgerStore>>,
    pub relay: Arc<OutboxRelay<InMemoryLedgerStore, InMemoryBusClient>>,
    pub store: Arc<InMemoryLedgerStore>,
    pub bus: Arc<InMemoryBusClient>,
}

pub fn build_in_memory(config: &AppConfig) -> InMemoryApp {
    let store = Arc::new(InMemoryLedgerStore::new());
    let bus = Arc::new(InMemoryBusClient::new());
    let (services, relay) = build_services(store.clone(), bus.clone(), config);

    InMemoryApp {
        services,
        relay,
        store,
        bus,
    }
}

/// Deployment wiring over any store/bus pair.
pub fn build_services<S, B>(
    store: Arc<S>,
    bus: Arc<B>,
    config: &AppConfig,
) -> (Arc<AppServices<S>>, Arc<OutboxRelay<S, B>>)
where
    S: LedgerStore,
    B: BusClient + 'static,
{
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let services = Arc::new(AppServices::new(
        store.clone(),
        clock.clone(),
        config.request_deadline(),
    ));
    let relay = Arc::new(OutboxRelay::new(store, bus, clock, config.relay_config()));
    (services, relay)
}
