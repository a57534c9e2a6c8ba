//! Durable persistence for the ledger.
//!
//! The [`LedgerStore`] trait is the only seam the engine sees: a
//! serializable-equivalent transaction handle plus row operations for
//! accounts, transactions, entries, snapshots, and the outbox. Two
//! implementations live here: Postgres via sqlx for deployment and an
//! in-memory store for tests/dev.

pub mod in_memory;
pub mod postgres;
pub mod schema;
mod store;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use store::{IsolationLevel, LedgerStore, StoreError};
