//! Pure balance derivation over ledger entries.
//!
//! Balances are derived, never stored as source of truth. Sign rules:
//! ASSET and EXPENSE accounts grow on debits; LIABILITY, EQUITY and REVENUE
//! accounts grow on credits.

use chrono::{DateTime, Utc};

use ledgerd_core::{LedgerResult, Money};

use crate::account::{Account, AccountType};
use crate::transaction::{EntrySide, LedgerEntry};

/// Whether an entry on `side` increases the balance of an account of this
/// classification.
pub fn increases_balance(account_type: AccountType, side: EntrySide) -> bool {
    match account_type {
        AccountType::Asset | AccountType::Expense => side == EntrySide::Debit,
        AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
            side == EntrySide::Credit
        }
    }
}

/// Fold one entry into a running balance.
pub fn apply_entry(
    balance: Money,
    account_type: AccountType,
    entry: &LedgerEntry,
) -> LedgerResult<Money> {
    let next = if increases_balance(account_type, entry.side) {
        balance.checked_add(entry.amount)?
    } else {
        balance.checked_sub(entry.amount)?
    };
    Ok(next)
}

/// Derive a balance from scratch over `entries`, optionally cut off at
/// `as_of` (inclusive). Entries are expected to be POSTED-only; the store is
/// responsible for that filter.
pub fn balance_as_of(
    account: &Account,
    entries: &[LedgerEntry],
    as_of: Option<DateTime<Utc>>,
) -> LedgerResult<Money> {
    let mut balance = Money::zero(account.currency);
    for entry in entries {
        if let Some(cutoff) = as_of {
            if entry.event_time > cutoff {
                continue;
            }
        }
        balance = apply_entry(balance, account.account_type, entry)?;
    }
    Ok(balance)
}
