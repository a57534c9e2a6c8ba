//! LedgerTransaction aggregate and its immutable entries.
//!
//! A transaction owns at least two entries whose per-currency debit and
//! credit totals match exactly. Entries never change after creation; the
//! transaction only moves through its status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerd_core::{
    AccountId, EntryId, ExternalId, LedgerError, LedgerResult, Money, TransactionId,
};

use crate::validator;

/// Business event category carried by a transaction and copied onto each of
/// its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Transfer,
    Pix,
    Ted,
    Doc,
    Fee,
    Interest,
    Reversal,
    Deposit,
    Withdrawal,
    Payment,
    Refund,
    Adjustment,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Transfer => "TRANSFER",
            EventCategory::Pix => "PIX",
            EventCategory::Ted => "TED",
            EventCategory::Doc => "DOC",
            EventCategory::Fee => "FEE",
            EventCategory::Interest => "INTEREST",
            EventCategory::Reversal => "REVERSAL",
            EventCategory::Deposit => "DEPOSIT",
            EventCategory::Withdrawal => "WITHDRAWAL",
            EventCategory::Payment => "PAYMENT",
            EventCategory::Refund => "REFUND",
            EventCategory::Adjustment => "ADJUSTMENT",
        }
    }
}

impl core::str::FromStr for EventCategory {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRANSFER" => Ok(EventCategory::Transfer),
            "PIX" => Ok(EventCategory::Pix),
            "TED" => Ok(EventCategory::Ted),
            "DOC" => Ok(EventCategory::Doc),
            "FEE" => Ok(EventCategory::Fee),
            "INTEREST" => Ok(EventCategory::Interest),
            "REVERSAL" => Ok(EventCategory::Reversal),
            "DEPOSIT" => Ok(EventCategory::Deposit),
            "WITHDRAWAL" => Ok(EventCategory::Withdrawal),
            "PAYMENT" => Ok(EventCategory::Payment),
            "REFUND" => Ok(EventCategory::Refund),
            "ADJUSTMENT" => Ok(EventCategory::Adjustment),
            other => Err(LedgerError::invalid_arg(format!(
                "unknown event category: {other}"
            ))),
        }
    }
}

/// Directional side of a posting; sign meaning depends on the account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntrySide {
    Debit,
    Credit,
}

impl EntrySide {
    pub fn flipped(&self) -> EntrySide {
        match self {
            EntrySide::Debit => EntrySide::Credit,
            EntrySide::Credit => EntrySide::Debit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntrySide::Debit => "DEBIT",
            EntrySide::Credit => "CREDIT",
        }
    }
}

impl core::str::FromStr for EntrySide {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBIT" => Ok(EntrySide::Debit),
            "CREDIT" => Ok(EntrySide::Credit),
            other => Err(LedgerError::invalid_arg(format!(
                "unknown entry side: {other}"
            ))),
        }
    }
}

/// Lifecycle: PENDING -> POSTED, PENDING -> FAILED, POSTED -> REVERSED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Posted,
    Reversed,
    Failed,
}

impl TransactionStatus {
    pub fn can_be_reversed(&self) -> bool {
        matches!(self, TransactionStatus::Posted)
    }

    /// Whether moving to `next` is a legal state-machine step.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Posted)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
                | (TransactionStatus::Posted, TransactionStatus::Reversed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Posted => "POSTED",
            TransactionStatus::Reversed => "REVERSED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl core::str::FromStr for TransactionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TransactionStatus::Pending),
            "POSTED" => Ok(TransactionStatus::Posted),
            "REVERSED" => Ok(TransactionStatus::Reversed),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(LedgerError::invalid_arg(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

/// One immutable side of a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub amount: Money,
    pub side: EntrySide,
    pub event_category: EventCategory,
    /// When the business event happened (caller-supplied; drives balances).
    pub event_time: DateTime<Utc>,
    /// When the entry hit the store.
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build an entry; the amount must be strictly positive.
    pub fn create(
        transaction_id: TransactionId,
        account_id: AccountId,
        amount: Money,
        side: EntrySide,
        event_category: EventCategory,
        event_time: DateTime<Utc>,
        recorded_at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        if amount.is_zero() {
            return Err(LedgerError::invalid_arg("entry amount must be positive"));
        }
        Ok(Self {
            entry_id: EntryId::new(),
            transaction_id,
            account_id,
            amount,
            side,
            event_category,
            event_time,
            recorded_at,
        })
    }

    /// Mirror this entry for a reversal: same account and amount, flipped
    /// side, fresh identity and times.
    pub fn mirror(&self, reversal_txn_id: TransactionId, now: DateTime<Utc>) -> Self {
        Self {
            entry_id: EntryId::new(),
            transaction_id: reversal_txn_id,
            account_id: self.account_id,
            amount: self.amount,
            side: self.side.flipped(),
            event_category: EventCategory::Reversal,
            event_time: now,
            recorded_at: now,
        }
    }

    pub fn is_debit(&self) -> bool {
        self.side == EntrySide::Debit
    }
}

/// A complete financial transaction: the aggregate root over its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub transaction_id: TransactionId,
    pub external_id: ExternalId,
    pub event_category: EventCategory,
    pub entries: Vec<LedgerEntry>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    /// Set when this transaction has been reversed; points at the reversal.
    pub reversed_by: Option<TransactionId>,
}

impl LedgerTransaction {
    /// Build a PENDING transaction after running full double-entry
    /// validation over `entries`.
    ///
    /// `entries` must already carry `transaction_id`; use
    /// [`LedgerTransaction::next_id`] to mint it before building them.
    pub fn create(
        transaction_id: TransactionId,
        external_id: ExternalId,
        event_category: EventCategory,
        entries: Vec<LedgerEntry>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        let txn = Self {
            transaction_id,
            external_id,
            event_category,
            entries,
            status: TransactionStatus::Pending,
            created_at: now,
            reversed_by: None,
        };
        validator::validate(&txn.entries)?;
        for entry in &txn.entries {
            if entry.transaction_id != txn.transaction_id {
                return Err(LedgerError::invalid_arg(
                    "entry does not belong to this transaction",
                ));
            }
        }
        Ok(txn)
    }

    /// Mint the id entries will be built against.
    pub fn next_id() -> TransactionId {
        TransactionId::new()
    }

    /// PENDING -> POSTED.
    pub fn post(&mut self) -> LedgerResult<()> {
        self.transition(TransactionStatus::Posted)
    }

    /// PENDING -> FAILED.
    pub fn mark_failed(&mut self) -> LedgerResult<()> {
        self.transition(TransactionStatus::Failed)
    }

    /// POSTED -> REVERSED, recording the reversal's id.
    pub fn mark_reversed(&mut self, reversal_id: TransactionId) -> LedgerResult<()> {
        self.transition(TransactionStatus::Reversed)?;
        self.reversed_by = Some(reversal_id);
        Ok(())
    }

    /// Build the compensating transaction: every entry mirrored with a
    /// flipped side under event category REVERSAL. Balanced by construction
    /// when this transaction is; validated again anyway.
    pub fn create_reversal(
        &self,
        reversal_external_id: ExternalId,
        now: DateTime<Utc>,
    ) -> LedgerResult<LedgerTransaction> {
        if !self.status.can_be_reversed() {
            return Err(LedgerError::NotReversible {
                transaction_id: self.transaction_id,
                status: self.status.as_str().to_string(),
            });
        }

        let reversal_id = TransactionId::new();
        let entries = self
            .entries
            .iter()
            .map(|e| e.mirror(reversal_id, now))
            .collect();

        LedgerTransaction::create(
            reversal_id,
            reversal_external_id,
            EventCategory::Reversal,
            entries,
            now,
        )
    }

    pub fn is_posted(&self) -> bool {
        self.status == TransactionStatus::Posted
    }

    fn transition(&mut self, next: TransactionStatus) -> LedgerResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(match next {
                TransactionStatus::Reversed => LedgerError::NotReversible {
                    transaction_id: self.transaction_id,
                    status: self.status.as_str().to_string(),
                },
                _ => LedgerError::invalid_arg(format!(
                    "cannot move transaction {} from {} to {}",
                    self.transaction_id,
                    self.status.as_str(),
                    next.as_str()
                )),
            });
        }
        self.status = next;
        Ok(())
    }
}
