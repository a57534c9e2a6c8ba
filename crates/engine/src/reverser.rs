//! Reversal protocol.
//!
//! A reversal is a fresh POSTED transaction mirroring the original's
//! entries with flipped sides; the original moves to REVERSED and records
//! the reversal's id. Idempotent on the reversal external id.

use std::sync::Arc;

use tracing::{debug, info};

use ledgerd_core::{AccountId, Clock, ExternalId, LedgerError, LedgerResult, TransactionId};
use ledgerd_events::{OutboxEventType, OutboxRecord, TransactionReversed};
use ledgerd_ledger::{LedgerTransaction, TransactionStatus};
use ledgerd_store::LedgerStore;

pub struct Reverser<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

const MAX_ATTEMPTS: u32 = 3;

impl<S: LedgerStore> Reverser<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Reverse a POSTED transaction. Calling again with the same
    /// `reversal_external_id` returns the stored reversal.
    pub async fn reverse(
        &self,
        original_id: TransactionId,
        reversal_external_id: ExternalId,
    ) -> LedgerResult<LedgerTransaction> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_reverse(original_id, &reversal_external_id).await {
                Err(LedgerError::DuplicateExternalId(_)) if attempt < 2 => {
                    debug!(%reversal_external_id, "reversal insert race, re-reading");
                }
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    debug!(%original_id, attempt, %err, "retrying reversal after conflict");
                }
                other => return other,
            }
        }
    }

    async fn try_reverse(
        &self,
        original_id: TransactionId,
        reversal_external_id: &ExternalId,
    ) -> LedgerResult<LedgerTransaction> {
        let mut txn = self.store.begin().await?;

        if let Some(existing) = self
            .store
            .find_transaction_by_external_id(&mut txn, reversal_external_id)
            .await?
        {
            self.store.commit(txn).await?;
            info!(
                external_id = %reversal_external_id,
                transaction_id = %existing.transaction_id,
                "reversal already posted, returning stored result"
            );
            return Ok(existing);
        }

        let original = self
            .store
            .find_transaction(&mut txn, original_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(original_id))?;

        let now = self.clock.now();
        // Balanced by construction when the original was; create() still
        // re-validates the mirror set.
        let mut reversal = original.create_reversal(reversal_external_id.clone(), now)?;

        let mut account_ids: Vec<AccountId> =
            reversal.entries.iter().map(|e| e.account_id).collect();
        account_ids.sort();
        account_ids.dedup();
        for account_id in account_ids {
            let account = self
                .store
                .lock_account(&mut txn, account_id)
                .await?
                .ok_or(LedgerError::AccountNotFound(account_id))?;
            account.ensure_active()?;
        }

        reversal.post()?;
        self.store.insert_transaction(&mut txn, &reversal).await?;
        self.store
            .update_transaction_status(
                &mut txn,
                original_id,
                TransactionStatus::Reversed,
                Some(reversal.transaction_id),
            )
            .await?;

        let payload =
            TransactionReversed::new(reversal.transaction_id, original_id, now).encode()?;
        let record = OutboxRecord::pending(
            reversal.transaction_id,
            OutboxEventType::TransactionReversed,
            payload,
            now,
        );
        self.store.insert_outbox(&mut txn, &record).await?;

        self.store.commit(txn).await?;

        info!(
            original_id = %original_id,
            reversal_id = %reversal.transaction_id,
            "reversed transaction"
        );
        Ok(reversal)
    }
}
