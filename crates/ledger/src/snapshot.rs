//! Balance snapshots: cached account balances at a cutoff instant.
//!
//! Snapshots only accelerate balance reads; entries remain the source of
//! truth and a snapshot can always be re-derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerd_core::{AccountId, EntryId, LedgerError, LedgerResult, Money, SnapshotId};

/// Immutable balance snapshot, unique per (account, cutoff).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub snapshot_id: SnapshotId,
    pub account_id: AccountId,
    pub balance: Money,
    /// Entries with `event_time <= snapshot_time` are folded in.
    pub snapshot_time: DateTime<Utc>,
    /// Last entry included, for auditing. None when no entries existed yet.
    pub last_entry_id: Option<EntryId>,
    pub created_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    /// Build a snapshot; the cutoff must not lie in the future.
    pub fn create(
        account_id: AccountId,
        balance: Money,
        snapshot_time: DateTime<Utc>,
        last_entry_id: Option<EntryId>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        if snapshot_time > now {
            return Err(LedgerError::invalid_arg(format!(
                "snapshot cutoff {snapshot_time} is in the future"
            )));
        }
        Ok(Self {
            snapshot_id: SnapshotId::new(),
            account_id,
            balance,
            snapshot_time,
            last_entry_id,
            created_at: now,
        })
    }
}
