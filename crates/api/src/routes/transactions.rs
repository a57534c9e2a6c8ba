use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use ledgerd_core::{Currency, ExternalId, LedgerError, TransactionId};
use ledgerd_engine::{EntryDraft, PostCommand};
use ledgerd_ledger::{EntrySide, EventCategory};
use ledgerd_store::LedgerStore;

use crate::app::AppServices;
use crate::dto;
use crate::errors;

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/transactions", post(post_transaction::<S>))
        .route("/transactions/:id", get(get_transaction::<S>))
        .route("/transactions/:id/reverse", post(reverse_transaction::<S>))
}

fn to_command(body: dto::PostTransactionRequest) -> Result<PostCommand, LedgerError> {
    let external_id = ExternalId::new(body.external_id)?;
    let event_category: EventCategory = body.event_type.parse()?;

    let mut entries = Vec::with_capacity(body.entries.len());
    for draft in body.entries {
        entries.push(EntryDraft {
            account_id: draft.account_id,
            amount: draft.amount,
            currency: Currency::new(&draft.currency)?,
            side: draft.side.parse::<EntrySide>()?,
        });
    }

    Ok(PostCommand {
        external_id,
        event_category,
        entries,
    })
}

async fn post_transaction<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<dto::PostTransactionRequest>,
) -> axum::response::Response {
    let command = match to_command(body) {
        Ok(command) => command,
        Err(err) => return errors::ledger_error_to_response(err),
    };

    match services.run(services.poster.post(command)).await {
        // Idempotent: a replayed external id returns the stored transaction
        // with the same shape and status code.
        Ok(txn) => (
            StatusCode::CREATED,
            Json(dto::TransactionResponse::from(&txn)),
        )
            .into_response(),
        Err(err) => errors::ledger_error_to_response(err),
    }
}

async fn get_transaction<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transaction_id = match id.parse::<TransactionId>() {
        Ok(id) => id,
        Err(err) => return errors::ledger_error_to_response(err),
    };

    match services
        .run(services.poster.get_transaction(transaction_id))
        .await
    {
        Ok(txn) => Json(dto::TransactionResponse::from(&txn)).into_response(),
        Err(err) => errors::ledger_error_to_response(err),
    }
}

async fn reverse_transaction<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReverseTransactionRequest>,
) -> axum::response::Response {
    let transaction_id = match id.parse::<TransactionId>() {
        Ok(id) => id,
        Err(err) => return errors::ledger_error_to_response(err),
    };
    let reversal_external_id = match ExternalId::new(body.reversal_external_id) {
        Ok(id) => id,
        Err(err) => return errors::ledger_error_to_response(err),
    };

    match services
        .run(
            services
                .reverser
                .reverse(transaction_id, reversal_external_id),
        )
        .await
    {
        Ok(reversal) => (
            StatusCode::CREATED,
            Json(dto::TransactionResponse::from(&reversal)),
        )
            .into_response(),
        Err(err) => errors::ledger_error_to_response(err),
    }
}
