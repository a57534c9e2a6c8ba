use axum::Router;

use ledgerd_store::LedgerStore;

pub mod accounts;
pub mod balances;
pub mod health;
pub mod snapshots;
pub mod transactions;

pub fn api_router<S: LedgerStore>() -> Router {
    Router::new()
        .merge(accounts::router::<S>())
        .merge(transactions::router::<S>())
        .merge(balances::router::<S>())
        .merge(snapshots::router::<S>())
}
