//! Domain error model.
//!
//! One variant per caller-visible failure kind. Domain errors are
//! deterministic business failures; infrastructure failures are mapped into
//! `StoreConflict` / `Internal` by the layers that produce them.

use thiserror::Error;

use crate::id::{AccountId, TransactionId};
use crate::money::MoneyError;

/// Result type used across the domain layer.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error taxonomy.
///
/// Errors are `Clone` and `PartialEq` so tests can compare them and callers
/// can carry them across task boundaries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller supplied malformed input.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Referenced account does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account exists but is BLOCKED or CLOSED.
    #[error("account {account_id} is {status} and cannot accept transactions")]
    AccountNotActive { account_id: AccountId, status: String },

    /// Entry currency differs from the account currency, or a cross-currency
    /// money operation was attempted.
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// Per-currency debit and credit totals differ.
    #[error("unbalanced entries for {currency}: debits={debits}, credits={credits}")]
    Unbalanced {
        currency: String,
        debits: String,
        credits: String,
    },

    /// Fewer than two entries in a transaction.
    #[error("double-entry requires at least 2 entries, found {0}")]
    TooFewEntries(usize),

    /// A currency appears among debits but not credits, or vice versa.
    #[error("currency set mismatch between debits and credits: {0}")]
    CurrencySetMismatch(String),

    /// Unique-index violation on the external id that was not caught by the
    /// idempotency read (concurrent insert race).
    #[error("duplicate external id: {0}")]
    DuplicateExternalId(String),

    /// Reversal requested for a transaction that is not POSTED.
    #[error("transaction {transaction_id} in status {status} cannot be reversed")]
    NotReversible {
        transaction_id: TransactionId,
        status: String,
    },

    /// Referenced transaction does not exist.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Illegal account status transition.
    #[error("invalid account state transition: {from} -> {to}")]
    InvalidAccountStateTransition { from: String, to: String },

    /// The store detected a serialization conflict; the operation may be
    /// retried by the caller after the engine's own bounded retries.
    #[error("store conflict: {0}")]
    StoreConflict(String),

    /// The per-operation deadline elapsed before commit.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Anything else. Logged; surfaced as 500.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn currency_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::CurrencyMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// True when retrying the whole operation could succeed (conflicts only;
    /// domain violations are deterministic).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreConflict(_))
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::CurrencyMismatch { expected, found } => Self::CurrencyMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            },
            MoneyError::NegativeResult => {
                Self::internal("money arithmetic produced a negative result")
            }
            MoneyError::InvalidCurrency(code) => {
                Self::invalid_arg(format!("invalid currency code: {code}"))
            }
            MoneyError::NegativeAmount(amount) => {
                Self::invalid_arg(format!("amount must not be negative: {amount}"))
            }
        }
    }
}
