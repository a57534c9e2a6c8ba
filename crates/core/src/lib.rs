//! Core value objects shared by every layer of the ledger service:
//! strongly-typed identifiers, exact decimal money, the domain error
//! taxonomy, and an injectable clock.

pub mod clock;
pub mod error;
pub mod id;
pub mod money;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, EntryId, ExternalId, OutboxRecordId, SnapshotId, TransactionId};
pub use money::{Currency, Money, MoneyError};
