//! Per-operation deadlines.
//!
//! The engine's operations hold a store transaction across every await
//! point, and both store implementations roll back when the handle is
//! dropped. Cancelling the future at the deadline therefore aborts the
//! in-flight transaction with no partial state.

use std::future::Future;
use std::time::Duration;

use ledgerd_core::{LedgerError, LedgerResult};

/// Run `operation` under `deadline`; on expiry the future is dropped (rolling
/// back any open store transaction) and `DeadlineExceeded` is surfaced.
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::DeadlineExceeded),
    }
}
