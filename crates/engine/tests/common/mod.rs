//! Shared harness: in-memory store + recording bus + manual clock wired
//! into every engine component.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use ledgerd_core::{AccountId, Clock, Currency, ExternalId, LedgerResult, ManualClock};
use ledgerd_engine::{
    AccountAdmin, BalanceEngine, EntryDraft, LedgerPoster, OutboxRelay, PostCommand, RelayConfig,
    Reverser, SnapshotMaker,
};
use ledgerd_events::{InMemoryBusClient, OutboxRecord};
use ledgerd_ledger::{Account, AccountType, EntrySide, EventCategory, LedgerTransaction};
use ledgerd_store::{InMemoryLedgerStore, LedgerStore};

pub fn start_time() -> DateTime<Utc> {
    "2026-01-15T12:00:00Z".parse().expect("valid start time")
}

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal literal")
}

pub fn brl() -> Currency {
    Currency::new("BRL").expect("valid currency")
}

pub struct Harness {
    pub store: Arc<InMemoryLedgerStore>,
    pub clock: Arc<ManualClock>,
    pub bus: Arc<InMemoryBusClient>,
    pub poster: LedgerPoster<InMemoryLedgerStore>,
    pub reverser: Reverser<InMemoryLedgerStore>,
    pub balances: BalanceEngine<InMemoryLedgerStore>,
    pub admin: AccountAdmin<InMemoryLedgerStore>,
    pub snapshots: SnapshotMaker<InMemoryLedgerStore>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let bus = Arc::new(InMemoryBusClient::new());

        Self {
            poster: LedgerPoster::new(store.clone(), dyn_clock.clone()),
            reverser: Reverser::new(store.clone(), dyn_clock.clone()),
            balances: BalanceEngine::new(store.clone(), dyn_clock.clone()),
            admin: AccountAdmin::new(store.clone(), dyn_clock.clone()),
            snapshots: SnapshotMaker::new(store.clone(), dyn_clock.clone()),
            store,
            clock,
            bus,
        }
    }

    pub fn relay(&self, config: RelayConfig) -> OutboxRelay<InMemoryLedgerStore, InMemoryBusClient> {
        let dyn_clock: Arc<dyn Clock> = self.clock.clone();
        OutboxRelay::new(self.store.clone(), self.bus.clone(), dyn_clock, config)
    }

    pub async fn account(&self, account_type: AccountType, currency: &str) -> Account {
        self.admin
            .create(account_type, Currency::new(currency).expect("valid currency"))
            .await
            .expect("account creation")
    }

    pub fn draft(account: &Account, amount: &str, currency: &str, side: EntrySide) -> EntryDraft {
        EntryDraft {
            account_id: account.account_id,
            amount: dec(amount),
            currency: Currency::new(currency).expect("valid currency"),
            side,
        }
    }

    pub async fn post(
        &self,
        external_id: &str,
        event_category: EventCategory,
        entries: Vec<EntryDraft>,
    ) -> LedgerResult<LedgerTransaction> {
        self.poster
            .post(PostCommand {
                external_id: ExternalId::new(external_id)?,
                event_category,
                entries,
            })
            .await
    }

    /// Simple deposit: debit `asset`, credit `funding`, both `amount` BRL.
    pub async fn deposit(
        &self,
        external_id: &str,
        asset: &Account,
        funding: &Account,
        amount: &str,
    ) -> LedgerResult<LedgerTransaction> {
        self.post(
            external_id,
            EventCategory::Deposit,
            vec![
                Self::draft(asset, amount, "BRL", EntrySide::Debit),
                Self::draft(funding, amount, "BRL", EntrySide::Credit),
            ],
        )
        .await
    }

    pub async fn balance_amount(&self, account_id: AccountId) -> Decimal {
        self.balances
            .get_balance(account_id)
            .await
            .expect("balance read")
            .amount()
    }

    pub async fn transaction(
        &self,
        id: ledgerd_core::TransactionId,
    ) -> Option<LedgerTransaction> {
        let mut store_txn = self.store.begin().await.expect("begin");
        let found = self
            .store
            .find_transaction(&mut store_txn, id)
            .await
            .expect("transaction query");
        self.store.commit(store_txn).await.expect("commit");
        found
    }

    pub async fn outbox_for(&self, txn: &LedgerTransaction) -> Vec<OutboxRecord> {
        let mut store_txn = self.store.begin().await.expect("begin");
        let records = self
            .store
            .find_outbox_by_aggregate(&mut store_txn, txn.transaction_id)
            .await
            .expect("outbox query");
        self.store.commit(store_txn).await.expect("commit");
        records
    }
}
