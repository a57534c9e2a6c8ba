//! Balance reads, as-of queries, and snapshot acceleration.

mod common;

use chrono::Duration;
use common::{dec, Harness};
use ledgerd_core::{Clock, LedgerError};
use ledgerd_ledger::AccountType;

#[tokio::test]
async fn as_of_balance_sees_only_history_up_to_cutoff() {
    let h = Harness::new();
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    h.deposit("x1", &a, &b, "100").await.unwrap();
    let t1 = h.clock.now();

    h.clock.advance(Duration::hours(1));
    h.deposit("x2", &a, &b, "50").await.unwrap();

    let at_t1 = h
        .balances
        .get_balance_as_of(a.account_id, t1)
        .await
        .unwrap();
    assert_eq!(at_t1.amount(), dec("100.00"));

    let now = h.balances.get_balance(a.account_id).await.unwrap();
    assert_eq!(now.amount(), dec("150.00"));
}

#[tokio::test]
async fn as_of_epoch_is_zero_in_account_currency() {
    let h = Harness::new();
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;
    h.deposit("x1", &a, &b, "100").await.unwrap();

    let at_epoch = h
        .balances
        .get_balance_as_of(a.account_id, chrono::DateTime::UNIX_EPOCH)
        .await
        .unwrap();
    assert!(at_epoch.is_zero());
    assert_eq!(at_epoch.currency().as_str(), "BRL");
}

#[tokio::test]
async fn unknown_account_fails_balance_read() {
    let h = Harness::new();
    let ghost = ledgerd_core::AccountId::new();
    let err = h.balances.get_balance(ghost).await.unwrap_err();
    assert_eq!(err, LedgerError::AccountNotFound(ghost));
}

#[tokio::test]
async fn snapshot_seeds_balance_and_limits_entry_scan() {
    let h = Harness::new();
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    for i in 0..10 {
        h.clock.advance(Duration::minutes(1));
        h.deposit(&format!("pre-{i}"), &a, &b, "100").await.unwrap();
    }

    let cutoff = h.clock.now();
    let created = h.snapshots.create_snapshots(cutoff).await.unwrap();
    assert_eq!(created, 2);

    for i in 0..5 {
        h.clock.advance(Duration::minutes(1));
        h.deposit(&format!("post-{i}"), &a, &b, "100").await.unwrap();
    }

    h.store.reset_entries_read();
    assert_eq!(h.balance_amount(a.account_id).await, dec("1500.00"));
    // Seeded read folds only the five post-snapshot entries.
    assert_eq!(h.store.entries_read(), 5);
}

#[tokio::test]
async fn snapshot_matches_full_rederivation() {
    let h = Harness::new();
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    for (i, amount) in ["10", "20.50", "0.25", "99.99"].iter().enumerate() {
        h.clock.advance(Duration::minutes(7));
        h.deposit(&format!("x-{i}"), &a, &b, amount).await.unwrap();
    }

    let cutoff = h.clock.now();
    h.snapshots.create_snapshots(cutoff).await.unwrap();

    // Later activity must not disturb the as-of value at the cutoff.
    h.clock.advance(Duration::hours(2));
    h.deposit("later", &a, &b, "1000").await.unwrap();

    let from_snapshot = h
        .balances
        .get_balance_as_of(a.account_id, cutoff)
        .await
        .unwrap();
    assert_eq!(from_snapshot.amount(), dec("130.74"));
}

#[tokio::test]
async fn snapshots_are_unique_per_cutoff_and_skipped_on_rerun() {
    let h = Harness::new();
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;
    h.deposit("x1", &a, &b, "100").await.unwrap();

    let cutoff = h.clock.now();
    assert_eq!(h.snapshots.create_snapshots(cutoff).await.unwrap(), 2);
    // Second run at the same cutoff creates nothing.
    assert_eq!(h.snapshots.create_snapshots(cutoff).await.unwrap(), 0);
}

#[tokio::test]
async fn future_cutoff_rejected() {
    let h = Harness::new();
    let future = h.clock.now() + Duration::seconds(1);

    let err = h.snapshots.create_snapshots(future).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArg(_)));

    let a = h.account(AccountType::Asset, "BRL").await;
    let err = h
        .snapshots
        .create_snapshot_for_account(a.account_id, future)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArg(_)));
}

#[tokio::test]
async fn blocked_accounts_are_excluded_from_the_batch() {
    let h = Harness::new();
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;
    h.deposit("x1", &a, &b, "100").await.unwrap();
    h.admin.block(b.account_id).await.unwrap();

    let created = h.snapshots.create_snapshots(h.clock.now()).await.unwrap();
    assert_eq!(created, 1);
}

#[tokio::test]
async fn incremental_snapshot_seeds_from_the_previous_one() {
    let h = Harness::new();
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    h.deposit("day1", &a, &b, "100").await.unwrap();
    let day1 = h.clock.now();
    h.snapshots.create_snapshots(day1).await.unwrap();

    h.clock.advance(Duration::days(1));
    h.deposit("day2", &a, &b, "40").await.unwrap();
    let day2 = h.clock.now();

    h.store.reset_entries_read();
    h.snapshots
        .create_snapshot_for_account(a.account_id, day2)
        .await
        .unwrap();
    // Day-two snapshot only folds the one new entry on top of day one's.
    assert_eq!(h.store.entries_read(), 1);

    h.clock.advance(Duration::hours(1));
    assert_eq!(h.balance_amount(a.account_id).await, dec("140.00"));
}
