//! Outbox relay scenarios: delivery, bounded retries, terminal failure,
//! and crash-safety of the record state machine.

mod common;

use std::time::Duration;

use common::Harness;
use ledgerd_core::ExternalId;
use ledgerd_engine::RelayConfig;
use ledgerd_events::{BusError, OutboxStatus, TransactionPosted, TransactionReversed};
use ledgerd_ledger::AccountType;

fn test_config(max_attempts: u32) -> RelayConfig {
    RelayConfig {
        poll_interval: Duration::from_millis(10),
        batch_size: 10,
        max_attempts,
        per_attempt_timeout: Duration::from_millis(500),
        health_log_interval: Duration::from_millis(10),
        topic_posted: "transaction-posted".to_string(),
        topic_reversed: "transaction-reversed".to_string(),
    }
}

#[tokio::test]
async fn posted_event_reaches_the_bus_keyed_by_aggregate() {
    let h = Harness::new();
    let relay = h.relay(test_config(5));
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    let txn = h.deposit("x1", &a, &b, "100").await.unwrap();

    let report = relay.tick().await.unwrap();
    assert_eq!(report.published, 1);

    let deliveries = h.bus.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].topic, "transaction-posted");
    assert_eq!(deliveries[0].key, txn.transaction_id.to_string());

    let payload = TransactionPosted::decode(&deliveries[0].payload).unwrap();
    assert_eq!(payload.transaction_id, txn.transaction_id);
    assert_eq!(payload.entries.len(), 2);
    assert_eq!(payload.entries[0].amount, "100.00");

    let outbox = h.outbox_for(&txn).await;
    assert_eq!(outbox[0].status, OutboxStatus::Processed);
    assert!(outbox[0].processed_at.is_some());
}

#[tokio::test]
async fn reversal_event_goes_to_the_reversed_topic() {
    let h = Harness::new();
    let relay = h.relay(test_config(5));
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    let txn = h.deposit("x1", &a, &b, "100").await.unwrap();
    let reversal = h
        .reverser
        .reverse(txn.transaction_id, ExternalId::new("r1").unwrap())
        .await
        .unwrap();

    relay.tick().await.unwrap();

    let deliveries = h.bus.deliveries();
    assert_eq!(deliveries.len(), 2);

    let reversed = deliveries
        .iter()
        .find(|d| d.topic == "transaction-reversed")
        .expect("reversed delivery present");
    assert_eq!(reversed.key, reversal.transaction_id.to_string());

    let payload = TransactionReversed::decode(&reversed.payload).unwrap();
    assert_eq!(payload.original_transaction_id, txn.transaction_id);
}

#[tokio::test]
async fn bounded_retries_then_terminal_failure_then_no_resurrection() {
    let h = Harness::new();
    let relay = h.relay(test_config(3));
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    let doomed = h.deposit("x1", &a, &b, "100").await.unwrap();
    h.bus.fail_with(BusError::Transport("broker down".into()));

    // Four ticks with a ceiling of three: attempts accumulate, then park.
    for _ in 0..4 {
        relay.tick().await.unwrap();
    }

    let outbox = h.outbox_for(&doomed).await;
    assert_eq!(outbox[0].status, OutboxStatus::Failed);
    assert!(outbox[0].attempts >= 3);
    assert!(outbox[0].last_error.as_deref().unwrap().contains("broker down"));

    // Healthy bus again: FAILED rows stay parked, fresh traffic flows.
    h.bus.heal();
    let fresh = h.deposit("x2", &a, &b, "50").await.unwrap();
    let report = relay.tick().await.unwrap();
    assert_eq!(report.published, 1);

    assert_eq!(h.outbox_for(&doomed).await[0].status, OutboxStatus::Failed);
    assert_eq!(h.outbox_for(&fresh).await[0].status, OutboxStatus::Processed);
    assert_eq!(h.bus.delivery_count(), 1);
}

#[tokio::test]
async fn failed_attempt_leaves_record_pending_with_error_recorded() {
    let h = Harness::new();
    let relay = h.relay(test_config(5));
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    let txn = h.deposit("x1", &a, &b, "100").await.unwrap();
    h.bus.fail_with(BusError::Transport("flaky".into()));
    relay.tick().await.unwrap();

    // Mid-stream failure: the record is still PENDING with the attempt
    // counted, never lost.
    let outbox = h.outbox_for(&txn).await;
    assert_eq!(outbox[0].status, OutboxStatus::Pending);
    assert_eq!(outbox[0].attempts, 1);
    assert!(outbox[0].processed_at.is_none());

    // The next healthy tick delivers it exactly as if nothing happened.
    h.bus.heal();
    relay.tick().await.unwrap();
    assert_eq!(h.outbox_for(&txn).await[0].status, OutboxStatus::Processed);
}

#[tokio::test]
async fn events_for_one_aggregate_publish_in_creation_order() {
    let h = Harness::new();
    let relay = h.relay(test_config(5));
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    let txn = h.deposit("x1", &a, &b, "100").await.unwrap();
    h.clock.advance(chrono::Duration::seconds(1));
    h.reverser
        .reverse(txn.transaction_id, ExternalId::new("r1").unwrap())
        .await
        .unwrap();

    relay.tick().await.unwrap();

    let topics: Vec<String> = h.bus.deliveries().into_iter().map(|d| d.topic).collect();
    assert_eq!(topics, vec!["transaction-posted", "transaction-reversed"]);
}

#[tokio::test]
async fn health_check_counts_pending_and_failed() {
    let h = Harness::new();
    let relay = h.relay(test_config(1));
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;

    h.deposit("x1", &a, &b, "100").await.unwrap();
    h.deposit("x2", &a, &b, "100").await.unwrap();

    let health = relay.health_check().await.unwrap();
    assert_eq!(health.pending, 2);
    assert_eq!(health.failed, 0);

    h.bus.fail_with(BusError::Transport("down".into()));
    relay.tick().await.unwrap();

    let health = relay.health_check().await.unwrap();
    assert_eq!(health.pending, 0);
    assert_eq!(health.failed, 2);
}

#[tokio::test]
async fn relay_worker_drains_the_outbox_and_shuts_down() {
    let h = Harness::new();
    let relay = std::sync::Arc::new(h.relay(test_config(5)));
    let a = h.account(AccountType::Asset, "BRL").await;
    let b = h.account(AccountType::Liability, "BRL").await;
    h.deposit("x1", &a, &b, "100").await.unwrap();

    let handle = relay.spawn();

    // Wait for the background loop to pick the record up.
    for _ in 0..100 {
        if h.bus.delivery_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.bus.delivery_count(), 1);

    handle.shutdown().await;
}
