//! Postgres schema for the ledger.
//!
//! Statements are idempotent so startup can run them unconditionally.

use sqlx::PgPool;

use crate::store::StoreError;

pub async fn init_schema(pool: &PgPool) -> Result<(), StoreError> {
    tracing::info!("initializing ledger schema");

    for statement in [
        CREATE_ACCOUNTS,
        CREATE_TRANSACTIONS,
        CREATE_TRANSACTIONS_EXTERNAL_ID_INDEX,
        CREATE_ENTRIES,
        CREATE_ENTRIES_ACCOUNT_INDEX,
        CREATE_ENTRIES_TRANSACTION_INDEX,
        CREATE_SNAPSHOTS,
        CREATE_OUTBOX,
        CREATE_OUTBOX_PENDING_INDEX,
        CREATE_OUTBOX_AGGREGATE_INDEX,
    ] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Backend(format!("schema init: {e}")))?;
    }

    Ok(())
}

const CREATE_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id UUID PRIMARY KEY,
    account_type TEXT NOT NULL,
    currency TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_transactions (
    id UUID PRIMARY KEY,
    external_id TEXT NOT NULL,
    event_category TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    reversed_by UUID
)
"#;

const CREATE_TRANSACTIONS_EXTERNAL_ID_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS ux_ledger_transactions_external_id
    ON ledger_transactions (external_id)
"#;

const CREATE_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries (
    id UUID PRIMARY KEY,
    transaction_id UUID NOT NULL REFERENCES ledger_transactions (id),
    account_id UUID NOT NULL REFERENCES accounts (id),
    amount NUMERIC NOT NULL CHECK (amount > 0),
    currency TEXT NOT NULL,
    side TEXT NOT NULL,
    event_category TEXT NOT NULL,
    event_time TIMESTAMPTZ NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_ENTRIES_ACCOUNT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS ix_ledger_entries_account_event_time
    ON ledger_entries (account_id, event_time)
"#;

const CREATE_ENTRIES_TRANSACTION_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS ix_ledger_entries_transaction
    ON ledger_entries (transaction_id)
"#;

const CREATE_SNAPSHOTS: &str = r#"
CREATE TABLE IF NOT EXISTS balance_snapshots (
    id UUID PRIMARY KEY,
    account_id UUID NOT NULL REFERENCES accounts (id),
    balance NUMERIC NOT NULL,
    currency TEXT NOT NULL,
    snapshot_time TIMESTAMPTZ NOT NULL,
    last_entry_id UUID,
    created_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT ux_balance_snapshots_account_cutoff UNIQUE (account_id, snapshot_time)
)
"#;

const CREATE_OUTBOX: &str = r#"
CREATE TABLE IF NOT EXISTS outbox_events (
    id UUID PRIMARY KEY,
    aggregate_id UUID NOT NULL,
    event_type TEXT NOT NULL,
    payload BYTEA NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    processed_at TIMESTAMPTZ,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    status TEXT NOT NULL
)
"#;

const CREATE_OUTBOX_PENDING_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS ix_outbox_events_pending
    ON outbox_events (status, created_at)
    WHERE status = 'PENDING'
"#;

const CREATE_OUTBOX_AGGREGATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS ix_outbox_events_aggregate
    ON outbox_events (aggregate_id)
"#;
