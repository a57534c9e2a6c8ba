use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use ledgerd_store::LedgerStore;

use crate::app::AppServices;
use crate::dto;
use crate::errors;

pub fn router<S: LedgerStore>() -> Router {
    Router::new().route("/snapshots", post(run_snapshots::<S>))
}

/// Manual snapshot trigger; the scheduled worker covers the daily run.
async fn run_snapshots<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    body: Option<Json<dto::SnapshotRequest>>,
) -> axum::response::Response {
    let cutoff = body
        .and_then(|Json(request)| request.cutoff)
        .unwrap_or_else(|| services.clock.now());

    match services
        .run(services.snapshots.create_snapshots(cutoff))
        .await
    {
        Ok(created) => (
            StatusCode::ACCEPTED,
            Json(dto::SnapshotRunResponse { created, cutoff }),
        )
            .into_response(),
        Err(err) => errors::ledger_error_to_response(err),
    }
}
