//! Wire payload schemas, declared once per event type.
//!
//! Payloads are serialized at posting time into the outbox row and parsed
//! again only when the relay publishes. Field names are camelCase on the
//! wire; amounts travel as plain decimal strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerd_core::{
    AccountId, ExternalId, LedgerError, LedgerResult, TransactionId,
};
use ledgerd_ledger::LedgerTransaction;

/// One entry inside a `TransactionPosted` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedEntry {
    pub account_id: AccountId,
    /// Decimal rendered as a string to keep consumers scale-exact.
    pub amount: String,
    pub currency: String,
    pub side: String,
}

/// Emitted once per posted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPosted {
    pub transaction_id: TransactionId,
    pub external_id: ExternalId,
    pub event_type: String,
    pub entries: Vec<PostedEntry>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionPosted {
    pub fn from_transaction(txn: &LedgerTransaction, now: DateTime<Utc>) -> Self {
        Self {
            transaction_id: txn.transaction_id,
            external_id: txn.external_id.clone(),
            event_type: txn.event_category.as_str().to_string(),
            entries: txn
                .entries
                .iter()
                .map(|e| PostedEntry {
                    account_id: e.account_id,
                    amount: e.amount.amount().to_string(),
                    currency: e.amount.currency().as_str().to_string(),
                    side: e.side.as_str().to_string(),
                })
                .collect(),
            timestamp: now,
        }
    }

    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| LedgerError::internal(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> LedgerResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| LedgerError::internal(e.to_string()))
    }
}

/// Emitted once per reversal; keyed by the reversal transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReversed {
    pub transaction_id: TransactionId,
    pub original_transaction_id: TransactionId,
    pub timestamp: DateTime<Utc>,
}

impl TransactionReversed {
    pub fn new(
        transaction_id: TransactionId,
        original_transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            original_transaction_id,
            timestamp: now,
        }
    }

    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| LedgerError::internal(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> LedgerResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| LedgerError::internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_payload_round_trips_with_camel_case_fields() {
        let payload = TransactionReversed::new(TransactionId::new(), TransactionId::new(), Utc::now());
        let bytes = payload.encode().unwrap();

        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json.get("transactionId").is_some());
        assert!(json.get("originalTransactionId").is_some());
        assert!(json.get("timestamp").is_some());

        assert_eq!(TransactionReversed::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn posted_payload_entries_serialize_amount_as_string() {
        let json = serde_json::json!({
            "transactionId": TransactionId::new(),
            "externalId": "x1",
            "eventType": "DEPOSIT",
            "entries": [{
                "accountId": AccountId::new(),
                "amount": "100.00",
                "currency": "BRL",
                "side": "DEBIT"
            }],
            "timestamp": Utc::now(),
        });

        let decoded = TransactionPosted::decode(json.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.entries[0].amount, "100.00");
        assert_eq!(decoded.entries[0].side, "DEBIT");
    }
}
