//! Account aggregate.
//!
//! One account, one currency; multi-currency needs multiple accounts.
//! Accounts are never deleted, only closed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerd_core::{AccountId, Currency, LedgerError, LedgerResult};

/// Account classification (determines the normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Revenue => "REVENUE",
            AccountType::Expense => "EXPENSE",
        }
    }
}

impl core::str::FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASSET" => Ok(AccountType::Asset),
            "LIABILITY" => Ok(AccountType::Liability),
            "EQUITY" => Ok(AccountType::Equity),
            "REVENUE" => Ok(AccountType::Revenue),
            "EXPENSE" => Ok(AccountType::Expense),
            other => Err(LedgerError::invalid_arg(format!(
                "unknown account type: {other}"
            ))),
        }
    }
}

/// Lifecycle: ACTIVE <-> BLOCKED, any -> CLOSED (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Blocked,
    Closed,
}

impl AccountStatus {
    pub fn can_accept_transactions(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Blocked => "BLOCKED",
            AccountStatus::Closed => "CLOSED",
        }
    }
}

impl core::str::FromStr for AccountStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(AccountStatus::Active),
            "BLOCKED" => Ok(AccountStatus::Blocked),
            "CLOSED" => Ok(AccountStatus::Closed),
            other => Err(LedgerError::invalid_arg(format!(
                "unknown account status: {other}"
            ))),
        }
    }
}

/// A financial account in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub account_type: AccountType,
    pub currency: Currency,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn create(account_type: AccountType, currency: Currency, now: DateTime<Utc>) -> Self {
        Self {
            account_id: AccountId::new(),
            account_type,
            currency,
            status: AccountStatus::Active,
            created_at: now,
        }
    }

    /// Fails unless the account can currently accept entries.
    pub fn ensure_active(&self) -> LedgerResult<()> {
        if !self.status.can_accept_transactions() {
            return Err(LedgerError::AccountNotActive {
                account_id: self.account_id,
                status: self.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Fails unless `currency` matches this account's fixed currency.
    pub fn ensure_currency(&self, currency: Currency) -> LedgerResult<()> {
        if self.currency != currency {
            return Err(LedgerError::currency_mismatch(
                self.currency.as_str(),
                currency.as_str(),
            ));
        }
        Ok(())
    }

    pub fn block(&mut self) -> LedgerResult<()> {
        if self.status == AccountStatus::Closed {
            return Err(self.invalid_transition(AccountStatus::Blocked));
        }
        self.status = AccountStatus::Blocked;
        Ok(())
    }

    pub fn unblock(&mut self) -> LedgerResult<()> {
        if self.status == AccountStatus::Closed {
            return Err(self.invalid_transition(AccountStatus::Active));
        }
        self.status = AccountStatus::Active;
        Ok(())
    }

    /// Terminal. Does not verify zero balance; operators block first if they
    /// need to drain an account.
    pub fn close(&mut self) -> LedgerResult<()> {
        self.status = AccountStatus::Closed;
        Ok(())
    }

    fn invalid_transition(&self, to: AccountStatus) -> LedgerError {
        LedgerError::InvalidAccountStateTransition {
            from: self.status.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerd_core::Currency;

    fn account() -> Account {
        Account::create(
            AccountType::Asset,
            Currency::new("BRL").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn new_accounts_are_active() {
        let acc = account();
        assert_eq!(acc.status, AccountStatus::Active);
        assert!(acc.ensure_active().is_ok());
    }

    #[test]
    fn block_and_unblock_round_trip() {
        let mut acc = account();
        acc.block().unwrap();
        assert_eq!(acc.status, AccountStatus::Blocked);
        assert!(acc.ensure_active().is_err());

        acc.unblock().unwrap();
        assert_eq!(acc.status, AccountStatus::Active);
    }

    #[test]
    fn closed_is_terminal() {
        let mut acc = account();
        acc.close().unwrap();

        assert!(matches!(
            acc.block(),
            Err(LedgerError::InvalidAccountStateTransition { .. })
        ));
        assert!(matches!(
            acc.unblock(),
            Err(LedgerError::InvalidAccountStateTransition { .. })
        ));
        // Closing again is a no-op, not an error.
        acc.close().unwrap();
        assert_eq!(acc.status, AccountStatus::Closed);
    }

    #[test]
    fn currency_is_fixed_for_life() {
        let acc = account();
        assert!(acc.ensure_currency(Currency::new("BRL").unwrap()).is_ok());
        assert!(matches!(
            acc.ensure_currency(Currency::new("USD").unwrap()),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
    }
}
