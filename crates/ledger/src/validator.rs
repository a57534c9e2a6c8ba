//! Double-entry validation.
//!
//! Core rule: for each currency present, the sum of debit amounts equals the
//! sum of credit amounts exactly, compared at full scale.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use ledgerd_core::{Currency, LedgerError, LedgerResult};

use crate::transaction::LedgerEntry;

/// Validate a set of entries against the double-entry rules:
///
/// 1. at least two entries;
/// 2. every entry belongs to the same transaction;
/// 3. each currency appearing among debits appears among credits and vice
///    versa;
/// 4. per currency, debit and credit totals are exactly equal.
pub fn validate(entries: &[LedgerEntry]) -> LedgerResult<()> {
    if entries.len() < 2 {
        return Err(LedgerError::TooFewEntries(entries.len()));
    }

    let owner = entries[0].transaction_id;
    if entries.iter().any(|e| e.transaction_id != owner) {
        return Err(LedgerError::invalid_arg(
            "entries belong to multiple transactions",
        ));
    }

    let mut debits: BTreeMap<Currency, Decimal> = BTreeMap::new();
    let mut credits: BTreeMap<Currency, Decimal> = BTreeMap::new();

    for entry in entries {
        let bucket = if entry.is_debit() {
            &mut debits
        } else {
            &mut credits
        };
        *bucket
            .entry(entry.amount.currency())
            .or_insert(Decimal::ZERO) += entry.amount.amount();
    }

    if !debits.keys().eq(credits.keys()) {
        let debit_set: Vec<&str> = debits.keys().map(Currency::as_str).collect();
        let credit_set: Vec<&str> = credits.keys().map(Currency::as_str).collect();
        return Err(LedgerError::CurrencySetMismatch(format!(
            "debits {debit_set:?} vs credits {credit_set:?}"
        )));
    }

    for (currency, debit_total) in &debits {
        let credit_total = credits.get(currency).copied().unwrap_or(Decimal::ZERO);
        if *debit_total != credit_total {
            return Err(LedgerError::Unbalanced {
                currency: currency.to_string(),
                debits: debit_total.to_string(),
                credits: credit_total.to_string(),
            });
        }
    }

    Ok(())
}

/// Non-failing variant for callers that only need a yes/no.
pub fn is_balanced(entries: &[LedgerEntry]) -> bool {
    validate(entries).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{EntrySide, EventCategory};
    use chrono::Utc;
    use ledgerd_core::{AccountId, Currency, Money, TransactionId};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn entry(txn: TransactionId, currency: &str, cents: i64, side: EntrySide) -> LedgerEntry {
        let currency = Currency::new(currency).unwrap();
        let amount = Money::new(Decimal::new(cents, 2), currency).unwrap();
        LedgerEntry::create(
            txn,
            AccountId::new(),
            amount,
            side,
            EventCategory::Transfer,
            Utc::now(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn balanced_pair_passes() {
        let txn = TransactionId::new();
        let entries = vec![
            entry(txn, "BRL", 10_000, EntrySide::Debit),
            entry(txn, "BRL", 10_000, EntrySide::Credit),
        ];
        assert!(validate(&entries).is_ok());
        assert!(is_balanced(&entries));
    }

    #[test]
    fn single_entry_rejected() {
        let txn = TransactionId::new();
        let entries = vec![entry(txn, "BRL", 10_000, EntrySide::Debit)];
        assert_eq!(validate(&entries), Err(LedgerError::TooFewEntries(1)));
    }

    #[test]
    fn unbalanced_totals_rejected() {
        let txn = TransactionId::new();
        let entries = vec![
            entry(txn, "BRL", 10_000, EntrySide::Debit),
            entry(txn, "BRL", 5_000, EntrySide::Credit),
        ];
        assert!(matches!(
            validate(&entries),
            Err(LedgerError::Unbalanced { .. })
        ));
    }

    #[test]
    fn currency_missing_on_credit_side_rejected() {
        let txn = TransactionId::new();
        let entries = vec![
            entry(txn, "BRL", 10_000, EntrySide::Debit),
            entry(txn, "USD", 10_000, EntrySide::Credit),
        ];
        assert!(matches!(
            validate(&entries),
            Err(LedgerError::CurrencySetMismatch(_))
        ));
    }

    #[test]
    fn multi_currency_balances_independently() {
        let txn = TransactionId::new();
        let entries = vec![
            entry(txn, "BRL", 10_000, EntrySide::Debit),
            entry(txn, "BRL", 10_000, EntrySide::Credit),
            entry(txn, "USD", 2_500, EntrySide::Debit),
            entry(txn, "USD", 2_500, EntrySide::Credit),
        ];
        assert!(validate(&entries).is_ok());
    }

    #[test]
    fn mixed_transaction_ids_rejected() {
        let txn = TransactionId::new();
        let entries = vec![
            entry(txn, "BRL", 10_000, EntrySide::Debit),
            entry(TransactionId::new(), "BRL", 10_000, EntrySide::Credit),
        ];
        assert!(matches!(validate(&entries), Err(LedgerError::InvalidArg(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Any set of mirrored debit/credit amounts validates, and skewing a
        /// single credit breaks it.
        #[test]
        fn mirrored_amounts_always_balance(
            cents in prop::collection::vec(1i64..1_000_000i64, 1..8)
        ) {
            let txn = TransactionId::new();
            let mut entries = Vec::with_capacity(cents.len() * 2);
            for &c in &cents {
                entries.push(entry(txn, "BRL", c, EntrySide::Debit));
                entries.push(entry(txn, "BRL", c, EntrySide::Credit));
            }
            prop_assert!(validate(&entries).is_ok());

            // Skew one credit by a cent and the set must fail.
            let last = entries.len() - 1;
            entries[last] = entry(txn, "BRL", cents[cents.len() - 1] + 1, EntrySide::Credit);
            let is_unbalanced = matches!(validate(&entries), Err(LedgerError::Unbalanced { .. }));
            prop_assert!(is_unbalanced);
        }
    }
}
