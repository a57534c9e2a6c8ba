//! Ledger posting engine.
//!
//! Posting is idempotent on the external id and atomic across the
//! transaction row, its entries, and the outbox record. Account row locks
//! are taken in ascending id order; that ordering is the sole deadlock
//! avoidance between concurrent posters.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ledgerd_core::{
    AccountId, Clock, Currency, ExternalId, LedgerError, LedgerResult, Money, TransactionId,
};
use ledgerd_events::{OutboxEventType, OutboxRecord, TransactionPosted};
use ledgerd_ledger::{Account, EntrySide, EventCategory, LedgerEntry, LedgerTransaction};
use ledgerd_store::LedgerStore;

/// One requested posting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub currency: Currency,
    pub side: EntrySide,
}

/// Request to post a balanced multi-entry transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCommand {
    pub external_id: ExternalId,
    pub event_category: EventCategory,
    pub entries: Vec<EntryDraft>,
}

/// Orchestrates idempotent atomic posting.
pub struct LedgerPoster<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

/// Bounded retries for serialization conflicts and the duplicate-insert
/// race (where the losing writer re-reads idempotently).
const MAX_ATTEMPTS: u32 = 3;

impl<S: LedgerStore> LedgerPoster<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Post a transaction. Re-posting the same external id returns the
    /// stored transaction unchanged and writes nothing.
    pub async fn post(&self, command: PostCommand) -> LedgerResult<LedgerTransaction> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_post(&command).await {
                // Another writer inserted the same external id between our
                // idempotency read and the insert; the re-read on the next
                // attempt returns their transaction.
                Err(LedgerError::DuplicateExternalId(_)) if attempt < 2 => {
                    debug!(external_id = %command.external_id, "external id insert race, re-reading");
                }
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    debug!(external_id = %command.external_id, attempt, %err, "retrying post after conflict");
                }
                other => return other,
            }
        }
    }

    /// Load a stored transaction with its entries.
    pub async fn get_transaction(&self, id: TransactionId) -> LedgerResult<LedgerTransaction> {
        let mut txn = self.store.begin().await?;
        let found = self
            .store
            .find_transaction(&mut txn, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        self.store.commit(txn).await?;
        Ok(found)
    }

    async fn try_post(&self, command: &PostCommand) -> LedgerResult<LedgerTransaction> {
        let mut txn = self.store.begin().await?;

        if let Some(existing) = self
            .store
            .find_transaction_by_external_id(&mut txn, &command.external_id)
            .await?
        {
            self.store.commit(txn).await?;
            info!(
                external_id = %command.external_id,
                transaction_id = %existing.transaction_id,
                "transaction already posted, returning stored result"
            );
            return Ok(existing);
        }

        let accounts = self.lock_accounts(&mut txn, command).await?;
        for draft in &command.entries {
            // lock_accounts loaded every drafted account.
            let account = &accounts[&draft.account_id];
            account.ensure_currency(draft.currency)?;
        }

        let now = self.clock.now();
        let transaction_id = LedgerTransaction::next_id();
        let mut entries = Vec::with_capacity(command.entries.len());
        for draft in &command.entries {
            let amount = Money::new(draft.amount, draft.currency)?;
            entries.push(LedgerEntry::create(
                transaction_id,
                draft.account_id,
                amount,
                draft.side,
                command.event_category,
                now,
                now,
            )?);
        }

        let mut transaction = LedgerTransaction::create(
            transaction_id,
            command.external_id.clone(),
            command.event_category,
            entries,
            now,
        )?;
        transaction.post()?;

        self.store.insert_transaction(&mut txn, &transaction).await?;

        let payload = TransactionPosted::from_transaction(&transaction, now).encode()?;
        let record = OutboxRecord::pending(
            transaction.transaction_id,
            OutboxEventType::TransactionPosted,
            payload,
            now,
        );
        self.store.insert_outbox(&mut txn, &record).await?;

        self.store.commit(txn).await?;

        info!(
            transaction_id = %transaction.transaction_id,
            external_id = %transaction.external_id,
            entries = transaction.entries.len(),
            "posted transaction"
        );
        Ok(transaction)
    }

    /// Lock the distinct drafted accounts in ascending id order and check
    /// each one can accept entries.
    async fn lock_accounts(
        &self,
        txn: &mut S::Txn,
        command: &PostCommand,
    ) -> LedgerResult<HashMap<AccountId, Account>> {
        let mut account_ids: Vec<AccountId> =
            command.entries.iter().map(|d| d.account_id).collect();
        account_ids.sort();
        account_ids.dedup();

        let mut accounts = HashMap::with_capacity(account_ids.len());
        for account_id in account_ids {
            let account = self
                .store
                .lock_account(txn, account_id)
                .await?
                .ok_or(LedgerError::AccountNotFound(account_id))?;
            account.ensure_active()?;
            accounts.insert(account_id, account);
        }
        Ok(accounts)
    }
}
