//! The `LedgerStore` contract and its error model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ledgerd_core::{AccountId, ExternalId, LedgerError, TransactionId};
use ledgerd_events::{OutboxRecord, OutboxStatus};
use ledgerd_ledger::{Account, AccountStatus, BalanceSnapshot, LedgerEntry, LedgerTransaction, TransactionStatus};

/// Infrastructure-level store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique index on the external id fired during insert.
    #[error("duplicate external id: {0}")]
    DuplicateExternalId(String),

    /// Unique index on (account, cutoff) fired during snapshot insert.
    #[error("snapshot already exists for account at this cutoff")]
    DuplicateSnapshot,

    /// An update would record an illegal status transition.
    #[error("illegal status transition for transaction {0}")]
    IllegalTransition(TransactionId),

    /// Serializable isolation detected a conflict; retry may succeed.
    #[error("serialization conflict: {0}")]
    Conflict(String),

    /// Anything else from the backend (connection, IO, corrupt row).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateExternalId(id) => LedgerError::DuplicateExternalId(id),
            StoreError::DuplicateSnapshot => {
                LedgerError::StoreConflict("snapshot already exists".to_string())
            }
            StoreError::IllegalTransition(id) => {
                LedgerError::internal(format!("illegal status transition recorded for {id}"))
            }
            StoreError::Conflict(msg) => LedgerError::StoreConflict(msg),
            StoreError::Backend(msg) => LedgerError::Internal(msg),
        }
    }
}

/// Transaction isolation requested from the backend.
///
/// `Snapshot` maps to the strongest snapshot-equivalent mode the backend
/// offers (REPEATABLE READ on Postgres).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    Serializable,
    Snapshot,
}

/// Atomic, durable persistence for the ledger.
///
/// Every method below runs inside a transaction handle obtained from
/// [`LedgerStore::begin`]. Dropping the handle without committing rolls the
/// transaction back; deadline enforcement relies on that.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    type Txn: Send;

    async fn begin(&self) -> Result<Self::Txn, StoreError>;
    async fn commit(&self, txn: Self::Txn) -> Result<(), StoreError>;
    async fn rollback(&self, txn: Self::Txn) -> Result<(), StoreError>;

    // -- accounts ----------------------------------------------------------

    async fn insert_account(
        &self,
        txn: &mut Self::Txn,
        account: &Account,
    ) -> Result<(), StoreError>;

    /// Plain read; no row lock.
    async fn find_account(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
    ) -> Result<Option<Account>, StoreError>;

    /// Acquire a write lock on the account row, released at transaction end.
    /// Callers lock multiple accounts in ascending id order; that discipline
    /// is the sole deadlock-avoidance mechanism.
    async fn lock_account(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
    ) -> Result<Option<Account>, StoreError>;

    async fn update_account_status(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<(), StoreError>;

    async fn list_accounts(
        &self,
        txn: &mut Self::Txn,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Account>, StoreError>;

    /// Ids of all ACTIVE accounts, ascending. Used by the snapshot maker.
    async fn list_active_account_ids(
        &self,
        txn: &mut Self::Txn,
    ) -> Result<Vec<AccountId>, StoreError>;

    // -- transactions ------------------------------------------------------

    /// Insert the transaction row plus all entry rows. Fails with
    /// [`StoreError::DuplicateExternalId`] when the unique index fires.
    async fn insert_transaction(
        &self,
        txn: &mut Self::Txn,
        transaction: &LedgerTransaction,
    ) -> Result<(), StoreError>;

    async fn find_transaction(
        &self,
        txn: &mut Self::Txn,
        id: TransactionId,
    ) -> Result<Option<LedgerTransaction>, StoreError>;

    /// Idempotency read: the stored transaction for a caller-supplied key.
    async fn find_transaction_by_external_id(
        &self,
        txn: &mut Self::Txn,
        external_id: &ExternalId,
    ) -> Result<Option<LedgerTransaction>, StoreError>;

    /// Only legal state-machine transitions are accepted; anything else is
    /// [`StoreError::IllegalTransition`].
    async fn update_transaction_status(
        &self,
        txn: &mut Self::Txn,
        id: TransactionId,
        status: TransactionStatus,
        reversed_by: Option<TransactionId>,
    ) -> Result<(), StoreError>;

    // -- entries -----------------------------------------------------------

    /// Entries of POSTED transactions for one account, ordered by event time
    /// ascending. `after` is exclusive, `up_to` inclusive.
    async fn find_posted_entries(
        &self,
        txn: &mut Self::Txn,
        account_id: AccountId,
        after: Option<DateTime<Utc>>,
        up_to: Option<DateTime<Utc>>,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    // -- snapshots ---------------------------------------------------------

    async fn insert_snapshot(
        &self,
        txn: &mut Self::Txn,
        snapshot: &BalanceSnapshot,
    ) -> Result<(), StoreError>;

    /// Latest snapshot with `snapshot_time <= at_or_before` (or latest
    /// overall when `None`).
    async fn find_latest_snapshot(
        &self,
        txn: &mut Self::Txn,
        account_id: AccountId,
        at_or_before: Option<DateTime<Utc>>,
    ) -> Result<Option<BalanceSnapshot>, StoreError>;

    /// Snapshot at exactly `cutoff`, if one exists.
    async fn find_snapshot_at(
        &self,
        txn: &mut Self::Txn,
        account_id: AccountId,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<BalanceSnapshot>, StoreError>;

    // -- outbox ------------------------------------------------------------

    async fn insert_outbox(
        &self,
        txn: &mut Self::Txn,
        record: &OutboxRecord,
    ) -> Result<(), StoreError>;

    /// Oldest-first PENDING rows, locked with skip-locked semantics so
    /// concurrent relays never hand out the same row twice.
    async fn fetch_pending_outbox(
        &self,
        txn: &mut Self::Txn,
        limit: u32,
    ) -> Result<Vec<OutboxRecord>, StoreError>;

    async fn update_outbox(
        &self,
        txn: &mut Self::Txn,
        record: &OutboxRecord,
    ) -> Result<(), StoreError>;

    /// Lock-free count for health reporting.
    async fn count_outbox_by_status(
        &self,
        txn: &mut Self::Txn,
        status: OutboxStatus,
    ) -> Result<u64, StoreError>;

    /// All records for one aggregate, creation order. Debugging and tests.
    async fn find_outbox_by_aggregate(
        &self,
        txn: &mut Self::Txn,
        aggregate_id: TransactionId,
    ) -> Result<Vec<OutboxRecord>, StoreError>;
}
