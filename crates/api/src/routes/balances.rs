use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use ledgerd_core::{AccountId, Money};
use ledgerd_store::LedgerStore;

use crate::app::AppServices;
use crate::dto;
use crate::errors;

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/balances/:account_id", get(get_balance::<S>))
        .route("/balances/:account_id/as-of", get(get_balance_as_of::<S>))
}

fn to_response(account_id: AccountId, balance: Money) -> axum::response::Response {
    Json(dto::BalanceResponse {
        account_id,
        amount: balance.amount(),
        currency: balance.currency().as_str().to_string(),
    })
    .into_response()
}

async fn get_balance<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match id.parse::<AccountId>() {
        Ok(id) => id,
        Err(err) => return errors::ledger_error_to_response(err),
    };

    match services.run(services.balances.get_balance(account_id)).await {
        Ok(balance) => to_response(account_id, balance),
        Err(err) => errors::ledger_error_to_response(err),
    }
}

async fn get_balance_as_of<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
    query: Result<Query<dto::AsOfQuery>, QueryRejection>,
) -> axum::response::Response {
    let account_id = match id.parse::<AccountId>() {
        Ok(id) => id,
        Err(err) => return errors::ledger_error_to_response(err),
    };

    // Keep the problem body on malformed/missing `time` instead of axum's
    // plain-text rejection.
    let Query(dto::AsOfQuery { time }) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return errors::problem(
                StatusCode::BAD_REQUEST,
                "invalid-argument",
                rejection.body_text(),
            )
        }
    };

    match services
        .run(services.balances.get_balance_as_of(account_id, time))
        .await
    {
        Ok(balance) => to_response(account_id, balance),
        Err(err) => errors::ledger_error_to_response(err),
    }
}
