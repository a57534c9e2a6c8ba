use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use ledgerd_core::{AccountId, Currency, LedgerError};
use ledgerd_ledger::AccountType;
use ledgerd_store::LedgerStore;

use crate::app::AppServices;
use crate::dto;
use crate::errors;

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route(
            "/accounts",
            post(create_account::<S>).get(list_accounts::<S>),
        )
        .route("/accounts/:id", get(get_account::<S>))
        .route("/accounts/:id/block", post(block_account::<S>))
        .route("/accounts/:id/unblock", post(unblock_account::<S>))
        .route("/accounts/:id/close", post(close_account::<S>))
}

async fn create_account<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<dto::CreateAccountRequest>,
) -> axum::response::Response {
    let account_type = match body.account_type.parse::<AccountType>() {
        Ok(t) => t,
        Err(err) => return errors::ledger_error_to_response(err),
    };
    let currency = match Currency::new(&body.currency) {
        Ok(c) => c,
        Err(err) => return errors::ledger_error_to_response(LedgerError::from(err)),
    };

    match services
        .run(services.admin.create(account_type, currency))
        .await
    {
        Ok(account) => (
            StatusCode::CREATED,
            Json(dto::AccountResponse::from(&account)),
        )
            .into_response(),
        Err(err) => errors::ledger_error_to_response(err),
    }
}

async fn get_account<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match id.parse::<AccountId>() {
        Ok(id) => id,
        Err(err) => return errors::ledger_error_to_response(err),
    };

    match services.run(services.admin.get(account_id)).await {
        Ok(account) => Json(dto::AccountResponse::from(&account)).into_response(),
        Err(err) => errors::ledger_error_to_response(err),
    }
}

async fn list_accounts<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(page): Query<dto::PaginationQuery>,
) -> axum::response::Response {
    match services
        .run(services.admin.list(page.offset, page.limit))
        .await
    {
        Ok(accounts) => Json(dto::Page {
            items: accounts
                .iter()
                .map(dto::AccountResponse::from)
                .collect::<Vec<_>>(),
            offset: page.offset,
            limit: page.limit,
        })
        .into_response(),
        Err(err) => errors::ledger_error_to_response(err),
    }
}

async fn block_account<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &id, |services, id| services.admin.block(id)).await
}

async fn unblock_account<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &id, |services, id| services.admin.unblock(id)).await
}

async fn close_account<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &id, |services, id| services.admin.close(id)).await
}

async fn transition<'a, S, F, Fut>(
    services: &'a Arc<AppServices<S>>,
    raw_id: &str,
    apply: F,
) -> axum::response::Response
where
    S: LedgerStore,
    F: FnOnce(&'a AppServices<S>, AccountId) -> Fut,
    Fut: std::future::Future<Output = ledgerd_core::LedgerResult<ledgerd_ledger::Account>>,
{
    let account_id = match raw_id.parse::<AccountId>() {
        Ok(id) => id,
        Err(err) => return errors::ledger_error_to_response(err),
    };

    match services.run(apply(services, account_id)).await {
        Ok(account) => Json(dto::AccountResponse::from(&account)).into_response(),
        Err(err) => errors::ledger_error_to_response(err),
    }
}
