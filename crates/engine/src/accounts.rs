//! Account administration: create, block, unblock, close.

use std::sync::Arc;

use tracing::info;

use ledgerd_core::{AccountId, Clock, Currency, LedgerError, LedgerResult};
use ledgerd_ledger::{Account, AccountType};
use ledgerd_store::LedgerStore;

pub struct AccountAdmin<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> AccountAdmin<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create(
        &self,
        account_type: AccountType,
        currency: Currency,
    ) -> LedgerResult<Account> {
        let account = Account::create(account_type, currency, self.clock.now());

        let mut txn = self.store.begin().await?;
        self.store.insert_account(&mut txn, &account).await?;
        self.store.commit(txn).await?;

        info!(
            account_id = %account.account_id,
            account_type = account.account_type.as_str(),
            currency = account.currency.as_str(),
            "created account"
        );
        Ok(account)
    }

    pub async fn get(&self, account_id: AccountId) -> LedgerResult<Account> {
        let mut txn = self.store.begin().await?;
        let account = self
            .store
            .find_account(&mut txn, account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        self.store.commit(txn).await?;
        Ok(account)
    }

    pub async fn list(&self, offset: u64, limit: u32) -> LedgerResult<Vec<Account>> {
        let mut txn = self.store.begin().await?;
        let accounts = self.store.list_accounts(&mut txn, offset, limit).await?;
        self.store.commit(txn).await?;
        Ok(accounts)
    }

    pub async fn block(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.transition(account_id, "blocked", Account::block).await
    }

    pub async fn unblock(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.transition(account_id, "unblocked", Account::unblock)
            .await
    }

    /// Terminal; does not verify zero balance (matching the state machine's
    /// documented limitation).
    pub async fn close(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.transition(account_id, "closed", Account::close).await
    }

    async fn transition(
        &self,
        account_id: AccountId,
        verb: &'static str,
        apply: fn(&mut Account) -> LedgerResult<()>,
    ) -> LedgerResult<Account> {
        let mut txn = self.store.begin().await?;
        let mut account = self
            .store
            .lock_account(&mut txn, account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        apply(&mut account)?;
        self.store
            .update_account_status(&mut txn, account_id, account.status)
            .await?;
        self.store.commit(txn).await?;

        info!(account_id = %account.account_id, "account {verb}");
        Ok(account)
    }
}
