//! Domain model for the double-entry ledger.
//!
//! Everything here is pure: aggregates, value types, state machines, and the
//! validation/balance services that operate on them. Persistence and
//! orchestration live in `ledgerd-store` and `ledgerd-engine`.

pub mod account;
pub mod balance;
pub mod snapshot;
pub mod transaction;
pub mod validator;

pub use account::{Account, AccountStatus, AccountType};
pub use snapshot::BalanceSnapshot;
pub use transaction::{EntrySide, EventCategory, LedgerEntry, LedgerTransaction, TransactionStatus};
