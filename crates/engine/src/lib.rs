//! Orchestration layer of the ledger service.
//!
//! Every operation opens an explicit store transaction, does its reads and
//! writes through the [`ledgerd_store::LedgerStore`] seam, and either
//! commits or lets the handle drop (which rolls back). Background work
//! (outbox relay, snapshot maker) runs as named long-lived workers with
//! cooperative shutdown.

pub mod accounts;
pub mod balance;
pub mod deadline;
pub mod poster;
pub mod relay;
pub mod reverser;
pub mod snapshots;
pub mod worker;

pub use accounts::AccountAdmin;
pub use balance::BalanceEngine;
pub use deadline::with_deadline;
pub use poster::{EntryDraft, LedgerPoster, PostCommand};
pub use relay::{OutboxHealth, OutboxRelay, RelayConfig, RelayTick};
pub use reverser::Reverser;
pub use snapshots::{SnapshotMaker, SnapshotWorkerConfig};
pub use worker::WorkerHandle;
