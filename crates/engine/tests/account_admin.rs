//! Account administration through the engine.

mod common;

use common::Harness;
use ledgerd_core::{AccountId, LedgerError};
use ledgerd_ledger::{AccountStatus, AccountType};

#[tokio::test]
async fn lifecycle_block_unblock_close() {
    let h = Harness::new();
    let account = h.account(AccountType::Asset, "BRL").await;
    assert_eq!(account.status, AccountStatus::Active);

    let blocked = h.admin.block(account.account_id).await.unwrap();
    assert_eq!(blocked.status, AccountStatus::Blocked);

    let active = h.admin.unblock(account.account_id).await.unwrap();
    assert_eq!(active.status, AccountStatus::Active);

    let closed = h.admin.close(account.account_id).await.unwrap();
    assert_eq!(closed.status, AccountStatus::Closed);

    // Closed is terminal.
    let err = h.admin.block(account.account_id).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidAccountStateTransition { .. }
    ));
    let err = h.admin.unblock(account.account_id).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidAccountStateTransition { .. }
    ));
}

#[tokio::test]
async fn operations_on_unknown_accounts_fail() {
    let h = Harness::new();
    let ghost = AccountId::new();

    assert_eq!(
        h.admin.get(ghost).await.unwrap_err(),
        LedgerError::AccountNotFound(ghost)
    );
    assert_eq!(
        h.admin.block(ghost).await.unwrap_err(),
        LedgerError::AccountNotFound(ghost)
    );
}

#[tokio::test]
async fn listing_pages_in_id_order() {
    let h = Harness::new();
    for _ in 0..5 {
        h.account(AccountType::Asset, "BRL").await;
    }

    let first_page = h.admin.list(0, 3).await.unwrap();
    let second_page = h.admin.list(3, 3).await.unwrap();
    assert_eq!(first_page.len(), 3);
    assert_eq!(second_page.len(), 2);

    let mut all: Vec<AccountId> = first_page
        .iter()
        .chain(&second_page)
        .map(|a| a.account_id)
        .collect();
    let sorted = {
        let mut s = all.clone();
        s.sort();
        s
    };
    assert_eq!(all.len(), 5);
    all.dedup();
    assert_eq!(all.len(), 5);
    assert_eq!(all, sorted);
}
