//! Postgres-backed ledger store.
//!
//! Row-level write locks come from `SELECT ... FOR UPDATE`; the outbox poll
//! uses `FOR UPDATE SKIP LOCKED` so concurrent relays never claim the same
//! row. Idempotency is enforced by the unique index on the external id; the
//! resulting `23505` is mapped back to a typed error.
//!
//! Error code mapping:
//!
//! | code  | meaning                  | mapped to              |
//! |-------|--------------------------|------------------------|
//! | 23505 | unique violation         | DuplicateExternalId / DuplicateSnapshot / Conflict |
//! | 40001 | serialization failure    | Conflict               |
//! | other | backend/connection error | Backend                |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use ledgerd_core::{
    AccountId, Currency, EntryId, ExternalId, Money, OutboxRecordId, SnapshotId, TransactionId,
};
use ledgerd_events::{OutboxEventType, OutboxRecord, OutboxStatus};
use ledgerd_ledger::{
    Account, AccountStatus, BalanceSnapshot, LedgerEntry, LedgerTransaction, TransactionStatus,
};

use crate::store::{IsolationLevel, LedgerStore, StoreError};

#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    isolation: IsolationLevel,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            isolation: IsolationLevel::Serializable,
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    async fn load_entries(
        txn: &mut Transaction<'static, Postgres>,
        transaction_id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, transaction_id, account_id, amount, currency, side,
                   event_category, event_time, recorded_at
            FROM ledger_entries
            WHERE transaction_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(*transaction_id.as_uuid())
        .fetch_all(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("load_entries", e))?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn load_transaction(
        txn: &mut Transaction<'static, Postgres>,
        row: &PgRow,
    ) -> Result<LedgerTransaction, StoreError> {
        let transaction_id = TransactionId::from_uuid(get(row, "id")?);
        let entries = Self::load_entries(txn, transaction_id).await?;

        let external_id: String = get(row, "external_id")?;
        let reversed_by: Option<Uuid> = get(row, "reversed_by")?;

        Ok(LedgerTransaction {
            transaction_id,
            external_id: ExternalId::new(external_id).map_err(corrupt)?,
            event_category: parse_text(row, "event_category")?,
            entries,
            status: parse_text(row, "status")?,
            created_at: get(row, "created_at")?,
            reversed_by: reversed_by.map(TransactionId::from_uuid),
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Txn = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Txn, StoreError> {
        let mut txn = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let level = match self.isolation {
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::Snapshot => "REPEATABLE READ",
        };
        sqlx::query(&format!("SET TRANSACTION ISOLATION LEVEL {level}"))
            .execute(&mut *txn)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        Ok(txn)
    }

    async fn commit(&self, txn: Self::Txn) -> Result<(), StoreError> {
        txn.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(&self, txn: Self::Txn) -> Result<(), StoreError> {
        txn.rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }

    async fn insert_account(
        &self,
        txn: &mut Self::Txn,
        account: &Account,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, account_type, currency, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*account.account_id.as_uuid())
        .bind(account.account_type.as_str())
        .bind(account.currency.as_str())
        .bind(account.status.as_str())
        .bind(account.created_at)
        .execute(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    async fn find_account(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            "SELECT id, account_type, currency, status, created_at FROM accounts WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("find_account", e))?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn lock_account(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_type, currency, status, created_at
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("lock_account", e))?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn update_account_status(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET status = $2 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(status.as_str())
            .execute(&mut **txn)
            .await
            .map_err(|e| map_sqlx_error("update_account_status", e))?;
        Ok(())
    }

    async fn list_accounts(
        &self,
        txn: &mut Self::Txn,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_type, currency, status, created_at
            FROM accounts
            ORDER BY id ASC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter().map(row_to_account).collect()
    }

    async fn list_active_account_ids(
        &self,
        txn: &mut Self::Txn,
    ) -> Result<Vec<AccountId>, StoreError> {
        let rows = sqlx::query("SELECT id FROM accounts WHERE status = 'ACTIVE' ORDER BY id ASC")
            .fetch_all(&mut **txn)
            .await
            .map_err(|e| map_sqlx_error("list_active_account_ids", e))?;

        rows.iter()
            .map(|row| Ok(AccountId::from_uuid(get(row, "id")?)))
            .collect()
    }

    #[instrument(skip(self, txn, transaction), fields(transaction_id = %transaction.transaction_id), err)]
    async fn insert_transaction(
        &self,
        txn: &mut Self::Txn,
        transaction: &LedgerTransaction,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_transactions
                (id, external_id, event_category, status, created_at, reversed_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*transaction.transaction_id.as_uuid())
        .bind(transaction.external_id.as_str())
        .bind(transaction.event_category.as_str())
        .bind(transaction.status.as_str())
        .bind(transaction.created_at)
        .bind(transaction.reversed_by.map(|id| *id.as_uuid()))
        .execute(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        for entry in &transaction.entries {
            sqlx::query(
                r#"
                INSERT INTO ledger_entries
                    (id, transaction_id, account_id, amount, currency, side,
                     event_category, event_time, recorded_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(*entry.entry_id.as_uuid())
            .bind(*entry.transaction_id.as_uuid())
            .bind(*entry.account_id.as_uuid())
            .bind(entry.amount.amount())
            .bind(entry.amount.currency().as_str())
            .bind(entry.side.as_str())
            .bind(entry.event_category.as_str())
            .bind(entry.event_time)
            .bind(entry.recorded_at)
            .execute(&mut **txn)
            .await
            .map_err(|e| map_sqlx_error("insert_entry", e))?;
        }

        Ok(())
    }

    async fn find_transaction(
        &self,
        txn: &mut Self::Txn,
        id: TransactionId,
    ) -> Result<Option<LedgerTransaction>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, event_category, status, created_at, reversed_by
            FROM ledger_transactions
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("find_transaction", e))?;

        match row {
            Some(row) => Ok(Some(Self::load_transaction(txn, &row).await?)),
            None => Ok(None),
        }
    }

    async fn find_transaction_by_external_id(
        &self,
        txn: &mut Self::Txn,
        external_id: &ExternalId,
    ) -> Result<Option<LedgerTransaction>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, event_category, status, created_at, reversed_by
            FROM ledger_transactions
            WHERE external_id = $1
            "#,
        )
        .bind(external_id.as_str())
        .fetch_optional(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("find_transaction_by_external_id", e))?;

        match row {
            Some(row) => Ok(Some(Self::load_transaction(txn, &row).await?)),
            None => Ok(None),
        }
    }

    async fn update_transaction_status(
        &self,
        txn: &mut Self::Txn,
        id: TransactionId,
        status: TransactionStatus,
        reversed_by: Option<TransactionId>,
    ) -> Result<(), StoreError> {
        let row = sqlx::query("SELECT status FROM ledger_transactions WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut **txn)
            .await
            .map_err(|e| map_sqlx_error("update_transaction_status", e))?
            .ok_or_else(|| StoreError::Backend(format!("transaction {id} vanished")))?;

        let current: TransactionStatus = parse_text(&row, "status")?;
        if !current.can_transition_to(status) {
            return Err(StoreError::IllegalTransition(id));
        }

        sqlx::query(
            r#"
            UPDATE ledger_transactions
            SET status = $2, reversed_by = COALESCE($3, reversed_by)
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .bind(status.as_str())
        .bind(reversed_by.map(|r| *r.as_uuid()))
        .execute(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("update_transaction_status", e))?;

        Ok(())
    }

    async fn find_posted_entries(
        &self,
        txn: &mut Self::Txn,
        account_id: AccountId,
        after: Option<DateTime<Utc>>,
        up_to: Option<DateTime<Utc>>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.transaction_id, e.account_id, e.amount, e.currency, e.side,
                   e.event_category, e.event_time, e.recorded_at
            FROM ledger_entries e
            JOIN ledger_transactions t ON t.id = e.transaction_id
            WHERE e.account_id = $1
              AND t.status = 'POSTED'
              AND ($2::timestamptz IS NULL OR e.event_time > $2)
              AND ($3::timestamptz IS NULL OR e.event_time <= $3)
            ORDER BY e.event_time ASC, e.id ASC
            "#,
        )
        .bind(*account_id.as_uuid())
        .bind(after)
        .bind(up_to)
        .fetch_all(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("find_posted_entries", e))?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn insert_snapshot(
        &self,
        txn: &mut Self::Txn,
        snapshot: &BalanceSnapshot,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO balance_snapshots
                (id, account_id, balance, currency, snapshot_time, last_entry_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*snapshot.snapshot_id.as_uuid())
        .bind(*snapshot.account_id.as_uuid())
        .bind(snapshot.balance.amount())
        .bind(snapshot.balance.currency().as_str())
        .bind(snapshot.snapshot_time)
        .bind(snapshot.last_entry_id.map(|id| *id.as_uuid()))
        .bind(snapshot.created_at)
        .execute(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("insert_snapshot", e))?;
        Ok(())
    }

    async fn find_latest_snapshot(
        &self,
        txn: &mut Self::Txn,
        account_id: AccountId,
        at_or_before: Option<DateTime<Utc>>,
    ) -> Result<Option<BalanceSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, balance, currency, snapshot_time, last_entry_id, created_at
            FROM balance_snapshots
            WHERE account_id = $1
              AND ($2::timestamptz IS NULL OR snapshot_time <= $2)
            ORDER BY snapshot_time DESC
            LIMIT 1
            "#,
        )
        .bind(*account_id.as_uuid())
        .bind(at_or_before)
        .fetch_optional(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("find_latest_snapshot", e))?;

        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn find_snapshot_at(
        &self,
        txn: &mut Self::Txn,
        account_id: AccountId,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<BalanceSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, balance, currency, snapshot_time, last_entry_id, created_at
            FROM balance_snapshots
            WHERE account_id = $1 AND snapshot_time = $2
            "#,
        )
        .bind(*account_id.as_uuid())
        .bind(cutoff)
        .fetch_optional(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("find_snapshot_at", e))?;

        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn insert_outbox(
        &self,
        txn: &mut Self::Txn,
        record: &OutboxRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO outbox_events
                (id, aggregate_id, event_type, payload, created_at,
                 processed_at, attempts, last_error, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(*record.record_id.as_uuid())
        .bind(*record.aggregate_id.as_uuid())
        .bind(record.event_type.as_str())
        .bind(&record.payload)
        .bind(record.created_at)
        .bind(record.processed_at)
        .bind(record.attempts as i32)
        .bind(record.last_error.as_deref())
        .bind(record.status.as_str())
        .execute(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("insert_outbox", e))?;
        Ok(())
    }

    #[instrument(skip(self, txn), err)]
    async fn fetch_pending_outbox(
        &self,
        txn: &mut Self::Txn,
        limit: u32,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, event_type, payload, created_at,
                   processed_at, attempts, last_error, status
            FROM outbox_events
            WHERE status = 'PENDING'
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("fetch_pending_outbox", e))?;

        rows.iter().map(row_to_outbox).collect()
    }

    async fn update_outbox(
        &self,
        txn: &mut Self::Txn,
        record: &OutboxRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = $2, attempts = $3, processed_at = $4, last_error = $5
            WHERE id = $1
            "#,
        )
        .bind(*record.record_id.as_uuid())
        .bind(record.status.as_str())
        .bind(record.attempts as i32)
        .bind(record.processed_at)
        .bind(record.last_error.as_deref())
        .execute(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("update_outbox", e))?;
        Ok(())
    }

    async fn count_outbox_by_status(
        &self,
        txn: &mut Self::Txn,
        status: OutboxStatus,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM outbox_events WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&mut **txn)
            .await
            .map_err(|e| map_sqlx_error("count_outbox_by_status", e))?;

        let n: i64 = get(&row, "n")?;
        Ok(n as u64)
    }

    async fn find_outbox_by_aggregate(
        &self,
        txn: &mut Self::Txn,
        aggregate_id: TransactionId,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, event_type, payload, created_at,
                   processed_at, attempts, last_error, status
            FROM outbox_events
            WHERE aggregate_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(*aggregate_id.as_uuid())
        .fetch_all(&mut **txn)
        .await
        .map_err(|e| map_sqlx_error("find_outbox_by_aggregate", e))?;

        rows.iter().map(row_to_outbox).collect()
    }
}

fn map_sqlx_error(op: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        let code = db.code().map(|c| c.to_string()).unwrap_or_default();
        match code.as_str() {
            "23505" => {
                let constraint = db.constraint().unwrap_or_default().to_string();
                if constraint.contains("external_id") {
                    return StoreError::DuplicateExternalId(constraint);
                }
                if constraint.contains("snapshot") {
                    return StoreError::DuplicateSnapshot;
                }
                return StoreError::Conflict(format!("{op}: unique violation on {constraint}"));
            }
            "40001" => return StoreError::Conflict(format!("{op}: serialization failure")),
            _ => {}
        }
    }
    StoreError::Backend(format!("{op}: {e}"))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("column {column}: {e}")))
}

fn parse_text<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    let text: String = get(row, column)?;
    text.parse().map_err(corrupt)
}

fn corrupt(e: impl core::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt row: {e}"))
}

fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
    let currency: String = get(row, "currency")?;
    Ok(Account {
        account_id: AccountId::from_uuid(get(row, "id")?),
        account_type: parse_text(row, "account_type")?,
        currency: Currency::new(&currency).map_err(corrupt)?,
        status: parse_text(row, "status")?,
        created_at: get(row, "created_at")?,
    })
}

fn row_to_entry(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let amount: Decimal = get(row, "amount")?;
    let currency: String = get(row, "currency")?;
    let money = Money::new(amount, Currency::new(&currency).map_err(corrupt)?).map_err(corrupt)?;

    Ok(LedgerEntry {
        entry_id: EntryId::from_uuid(get(row, "id")?),
        transaction_id: TransactionId::from_uuid(get(row, "transaction_id")?),
        account_id: AccountId::from_uuid(get(row, "account_id")?),
        amount: money,
        side: parse_text(row, "side")?,
        event_category: parse_text(row, "event_category")?,
        event_time: get(row, "event_time")?,
        recorded_at: get(row, "recorded_at")?,
    })
}

fn row_to_snapshot(row: &PgRow) -> Result<BalanceSnapshot, StoreError> {
    let balance: Decimal = get(row, "balance")?;
    let currency: String = get(row, "currency")?;
    let last_entry_id: Option<Uuid> = get(row, "last_entry_id")?;

    Ok(BalanceSnapshot {
        snapshot_id: SnapshotId::from_uuid(get(row, "id")?),
        account_id: AccountId::from_uuid(get(row, "account_id")?),
        balance: Money::new(balance, Currency::new(&currency).map_err(corrupt)?)
            .map_err(corrupt)?,
        snapshot_time: get(row, "snapshot_time")?,
        last_entry_id: last_entry_id.map(EntryId::from_uuid),
        created_at: get(row, "created_at")?,
    })
}

fn row_to_outbox(row: &PgRow) -> Result<OutboxRecord, StoreError> {
    let attempts: i32 = get(row, "attempts")?;
    Ok(OutboxRecord {
        record_id: OutboxRecordId::from_uuid(get(row, "id")?),
        aggregate_id: TransactionId::from_uuid(get(row, "aggregate_id")?),
        event_type: parse_text(row, "event_type")?,
        payload: get(row, "payload")?,
        created_at: get(row, "created_at")?,
        processed_at: get(row, "processed_at")?,
        attempts: attempts as u32,
        last_error: get(row, "last_error")?,
        status: parse_text(row, "status")?,
    })
}
