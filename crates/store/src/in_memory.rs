//! In-memory ledger store.
//!
//! Intended for tests/dev. A single async mutex serializes whole
//! transactions, which makes the store trivially serializable-equivalent;
//! writes are staged on a copy of the state and only become visible on
//! commit. Dropping a transaction handle without committing discards the
//! staged state, which is exactly the rollback-on-deadline behavior the
//! engine relies on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use ledgerd_core::{AccountId, ExternalId, TransactionId};
use ledgerd_events::{OutboxRecord, OutboxStatus};
use ledgerd_ledger::{
    Account, AccountStatus, BalanceSnapshot, LedgerEntry, LedgerTransaction, TransactionStatus,
};

use crate::store::{LedgerStore, StoreError};

#[derive(Debug, Default, Clone)]
struct State {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<TransactionId, LedgerTransaction>,
    by_external_id: HashMap<ExternalId, TransactionId>,
    snapshots: Vec<BalanceSnapshot>,
    outbox: Vec<OutboxRecord>,
}

/// Staged-write transaction over the whole store.
pub struct InMemoryTxn {
    // Holding the guard for the lifetime of the handle serializes writers.
    guard: OwnedMutexGuard<State>,
    staged: State,
}

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<State>>,
    entries_read: AtomicU64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total ledger entries returned by `find_posted_entries` since the last
    /// reset. Lets tests verify that snapshot-seeded balance reads scan only
    /// the incremental tail.
    pub fn entries_read(&self) -> u64 {
        self.entries_read.load(Ordering::Relaxed)
    }

    pub fn reset_entries_read(&self) {
        self.entries_read.store(0, Ordering::Relaxed);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Txn = InMemoryTxn;

    async fn begin(&self) -> Result<Self::Txn, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTxn { guard, staged })
    }

    async fn commit(&self, mut txn: Self::Txn) -> Result<(), StoreError> {
        *txn.guard = txn.staged;
        Ok(())
    }

    async fn rollback(&self, txn: Self::Txn) -> Result<(), StoreError> {
        drop(txn);
        Ok(())
    }

    async fn insert_account(
        &self,
        txn: &mut Self::Txn,
        account: &Account,
    ) -> Result<(), StoreError> {
        txn.staged
            .accounts
            .insert(account.account_id, account.clone());
        Ok(())
    }

    async fn find_account(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        Ok(txn.staged.accounts.get(&id).cloned())
    }

    async fn lock_account(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        // The store-wide mutex already serializes writers; a per-row lock
        // would be redundant here.
        Ok(txn.staged.accounts.get(&id).cloned())
    }

    async fn update_account_status(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<(), StoreError> {
        let account = txn
            .staged
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("account {id} vanished")))?;
        account.status = status;
        Ok(())
    }

    async fn list_accounts(
        &self,
        txn: &mut Self::Txn,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> = txn.staged.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.account_id);
        Ok(accounts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_active_account_ids(
        &self,
        txn: &mut Self::Txn,
    ) -> Result<Vec<AccountId>, StoreError> {
        let mut ids: Vec<AccountId> = txn
            .staged
            .accounts
            .values()
            .filter(|a| a.status == AccountStatus::Active)
            .map(|a| a.account_id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn insert_transaction(
        &self,
        txn: &mut Self::Txn,
        transaction: &LedgerTransaction,
    ) -> Result<(), StoreError> {
        if txn
            .staged
            .by_external_id
            .contains_key(&transaction.external_id)
        {
            return Err(StoreError::DuplicateExternalId(
                transaction.external_id.to_string(),
            ));
        }
        txn.staged
            .by_external_id
            .insert(transaction.external_id.clone(), transaction.transaction_id);
        txn.staged
            .transactions
            .insert(transaction.transaction_id, transaction.clone());
        Ok(())
    }

    async fn find_transaction(
        &self,
        txn: &mut Self::Txn,
        id: TransactionId,
    ) -> Result<Option<LedgerTransaction>, StoreError> {
        Ok(txn.staged.transactions.get(&id).cloned())
    }

    async fn find_transaction_by_external_id(
        &self,
        txn: &mut Self::Txn,
        external_id: &ExternalId,
    ) -> Result<Option<LedgerTransaction>, StoreError> {
        Ok(txn
            .staged
            .by_external_id
            .get(external_id)
            .and_then(|id| txn.staged.transactions.get(id))
            .cloned())
    }

    async fn update_transaction_status(
        &self,
        txn: &mut Self::Txn,
        id: TransactionId,
        status: TransactionStatus,
        reversed_by: Option<TransactionId>,
    ) -> Result<(), StoreError> {
        let stored = txn
            .staged
            .transactions
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("transaction {id} vanished")))?;
        if !stored.status.can_transition_to(status) {
            return Err(StoreError::IllegalTransition(id));
        }
        stored.status = status;
        if reversed_by.is_some() {
            stored.reversed_by = reversed_by;
        }
        Ok(())
    }

    async fn find_posted_entries(
        &self,
        txn: &mut Self::Txn,
        account_id: AccountId,
        after: Option<DateTime<Utc>>,
        up_to: Option<DateTime<Utc>>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries: Vec<LedgerEntry> = txn
            .staged
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Posted)
            .flat_map(|t| t.entries.iter())
            .filter(|e| e.account_id == account_id)
            .filter(|e| after.map_or(true, |t| e.event_time > t))
            .filter(|e| up_to.map_or(true, |t| e.event_time <= t))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.event_time
                .cmp(&b.event_time)
                .then(a.entry_id.cmp(&b.entry_id))
        });
        self.entries_read
            .fetch_add(entries.len() as u64, Ordering::Relaxed);
        Ok(entries)
    }

    async fn insert_snapshot(
        &self,
        txn: &mut Self::Txn,
        snapshot: &BalanceSnapshot,
    ) -> Result<(), StoreError> {
        let duplicate = txn.staged.snapshots.iter().any(|s| {
            s.account_id == snapshot.account_id && s.snapshot_time == snapshot.snapshot_time
        });
        if duplicate {
            return Err(StoreError::DuplicateSnapshot);
        }
        txn.staged.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn find_latest_snapshot(
        &self,
        txn: &mut Self::Txn,
        account_id: AccountId,
        at_or_before: Option<DateTime<Utc>>,
    ) -> Result<Option<BalanceSnapshot>, StoreError> {
        Ok(txn
            .staged
            .snapshots
            .iter()
            .filter(|s| s.account_id == account_id)
            .filter(|s| at_or_before.map_or(true, |t| s.snapshot_time <= t))
            .max_by_key(|s| s.snapshot_time)
            .cloned())
    }

    async fn find_snapshot_at(
        &self,
        txn: &mut Self::Txn,
        account_id: AccountId,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<BalanceSnapshot>, StoreError> {
        Ok(txn
            .staged
            .snapshots
            .iter()
            .find(|s| s.account_id == account_id && s.snapshot_time == cutoff)
            .cloned())
    }

    async fn insert_outbox(
        &self,
        txn: &mut Self::Txn,
        record: &OutboxRecord,
    ) -> Result<(), StoreError> {
        txn.staged.outbox.push(record.clone());
        Ok(())
    }

    async fn fetch_pending_outbox(
        &self,
        txn: &mut Self::Txn,
        limit: u32,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let mut pending: Vec<OutboxRecord> = txn
            .staged
            .outbox
            .iter()
            .filter(|r| r.status == OutboxStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.record_id.cmp(&b.record_id))
        });
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn update_outbox(
        &self,
        txn: &mut Self::Txn,
        record: &OutboxRecord,
    ) -> Result<(), StoreError> {
        let stored = txn
            .staged
            .outbox
            .iter_mut()
            .find(|r| r.record_id == record.record_id)
            .ok_or_else(|| {
                StoreError::Backend(format!("outbox record {} vanished", record.record_id))
            })?;
        *stored = record.clone();
        Ok(())
    }

    async fn count_outbox_by_status(
        &self,
        txn: &mut Self::Txn,
        status: OutboxStatus,
    ) -> Result<u64, StoreError> {
        Ok(txn
            .staged
            .outbox
            .iter()
            .filter(|r| r.status == status)
            .count() as u64)
    }

    async fn find_outbox_by_aggregate(
        &self,
        txn: &mut Self::Txn,
        aggregate_id: TransactionId,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let mut records: Vec<OutboxRecord> = txn
            .staged
            .outbox
            .iter()
            .filter(|r| r.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerd_core::{Currency, Money};
    use ledgerd_ledger::{AccountType, EntrySide, EventCategory};
    use rust_decimal::Decimal;

    fn account(currency: &str) -> Account {
        Account::create(
            AccountType::Asset,
            Currency::new(currency).unwrap(),
            Utc::now(),
        )
    }

    fn posted_txn(external: &str, debit: AccountId, credit: AccountId) -> LedgerTransaction {
        let now = Utc::now();
        let txn_id = LedgerTransaction::next_id();
        let amount = Money::new(Decimal::from(100), Currency::new("BRL").unwrap()).unwrap();
        let entries = vec![
            LedgerEntry::create(
                txn_id,
                debit,
                amount,
                EntrySide::Debit,
                EventCategory::Deposit,
                now,
                now,
            )
            .unwrap(),
            LedgerEntry::create(
                txn_id,
                credit,
                amount,
                EntrySide::Credit,
                EventCategory::Deposit,
                now,
                now,
            )
            .unwrap(),
        ];
        let mut txn = LedgerTransaction::create(
            txn_id,
            ExternalId::new(external).unwrap(),
            EventCategory::Deposit,
            entries,
            now,
        )
        .unwrap();
        txn.post().unwrap();
        txn
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = InMemoryLedgerStore::new();
        let acc = account("BRL");

        let mut txn = store.begin().await.unwrap();
        store.insert_account(&mut txn, &acc).await.unwrap();
        store.rollback(txn).await.unwrap();

        let mut txn = store.begin().await.unwrap();
        assert!(store
            .find_account(&mut txn, acc.account_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_external_id_rejected() {
        let store = InMemoryLedgerStore::new();
        let (a, b) = (account("BRL"), account("BRL"));

        let mut txn = store.begin().await.unwrap();
        store.insert_account(&mut txn, &a).await.unwrap();
        store.insert_account(&mut txn, &b).await.unwrap();
        store
            .insert_transaction(&mut txn, &posted_txn("x1", a.account_id, b.account_id))
            .await
            .unwrap();
        store.commit(txn).await.unwrap();

        let mut txn = store.begin().await.unwrap();
        let err = store
            .insert_transaction(&mut txn, &posted_txn("x1", a.account_id, b.account_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateExternalId(_)));
    }

    #[tokio::test]
    async fn pending_outbox_is_fifo_and_bounded() {
        let store = InMemoryLedgerStore::new();
        let mut txn = store.begin().await.unwrap();

        let t0 = Utc::now();
        for i in 0..5 {
            let record = OutboxRecord::pending(
                TransactionId::new(),
                ledgerd_events::OutboxEventType::TransactionPosted,
                b"{}".to_vec(),
                t0 + chrono::Duration::seconds(i),
            );
            store.insert_outbox(&mut txn, &record).await.unwrap();
        }
        store.commit(txn).await.unwrap();

        let mut txn = store.begin().await.unwrap();
        let batch = store.fetch_pending_outbox(&mut txn, 3).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn illegal_status_update_rejected() {
        let store = InMemoryLedgerStore::new();
        let (a, b) = (account("BRL"), account("BRL"));
        let txn_record = posted_txn("x1", a.account_id, b.account_id);

        let mut txn = store.begin().await.unwrap();
        store.insert_transaction(&mut txn, &txn_record).await.unwrap();
        store.commit(txn).await.unwrap();

        let mut txn = store.begin().await.unwrap();
        let err = store
            .update_transaction_status(
                &mut txn,
                txn_record.transaction_id,
                TransactionStatus::Failed,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition(_)));
    }
}
