//! Wire DTOs. camelCase on the wire; amounts travel as decimal strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerd_core::{AccountId, EntryId, TransactionId};
use ledgerd_ledger::{Account, LedgerEntry, LedgerTransaction};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub account_type: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub account_id: AccountId,
    pub account_type: &'static str,
    pub currency: String,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.account_id,
            account_type: account.account_type.as_str(),
            currency: account.currency.as_str().to_string(),
            status: account.status.as_str(),
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_page_limit")]
    pub limit: u32,
}

fn default_page_limit() -> u32 {
    50
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraftRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub currency: String,
    pub side: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTransactionRequest {
    pub external_id: String,
    pub event_type: String,
    pub entries: Vec<EntryDraftRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseTransactionRequest {
    pub reversal_external_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub entry_id: EntryId,
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub currency: String,
    pub side: &'static str,
    pub event_type: &'static str,
    pub event_time: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for EntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            entry_id: entry.entry_id,
            transaction_id: entry.transaction_id,
            account_id: entry.account_id,
            amount: entry.amount.amount(),
            currency: entry.amount.currency().as_str().to_string(),
            side: entry.side.as_str(),
            event_type: entry.event_category.as_str(),
            event_time: entry.event_time,
            recorded_at: entry.recorded_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub transaction_id: TransactionId,
    pub external_id: String,
    pub event_type: &'static str,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<EntryResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversal_transaction_id: Option<TransactionId>,
}

impl From<&LedgerTransaction> for TransactionResponse {
    fn from(txn: &LedgerTransaction) -> Self {
        Self {
            transaction_id: txn.transaction_id,
            external_id: txn.external_id.to_string(),
            event_type: txn.event_category.as_str(),
            status: txn.status.as_str(),
            created_at: txn.created_at,
            entries: txn.entries.iter().map(EntryResponse::from).collect(),
            reversal_transaction_id: txn.reversed_by,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsOfQuery {
    /// ISO 8601 instant.
    pub time: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    /// Cutoff instant; defaults to now. Rejected when in the future.
    #[serde(default)]
    pub cutoff: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRunResponse {
    pub created: u32,
    pub cutoff: DateTime<Utc>,
}
