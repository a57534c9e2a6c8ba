//! Outbox relay: polls PENDING rows, publishes to the bus, records the
//! outcome, and retries with a bounded attempt count.
//!
//! Each poll runs in one store transaction with skip-locked row claims, so
//! a second relay instance never reprocesses the same rows. Publishing is
//! awaited per record; the row is only marked PROCESSED after the broker
//! acknowledged, which is what makes delivery at-least-once rather than
//! at-most-once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use ledgerd_core::{Clock, LedgerResult};
use ledgerd_events::{
    BusClient, BusError, OutboxEventType, OutboxRecord, OutboxStatus, TransactionPosted,
    TransactionReversed,
};
use ledgerd_store::LedgerStore;

use crate::worker::{shutdown_channel, WorkerHandle};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Sleep between polls.
    pub poll_interval: Duration,
    /// Max rows claimed per poll.
    pub batch_size: u32,
    /// Attempts before a record is parked as FAILED.
    pub max_attempts: u32,
    /// Per-publish timeout; a timeout counts as a failed attempt.
    pub per_attempt_timeout: Duration,
    /// Cadence of the pending/failed health log line.
    pub health_log_interval: Duration,
    pub topic_posted: String,
    pub topic_reversed: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            batch_size: 100,
            max_attempts: 5,
            per_attempt_timeout: Duration::from_millis(10_000),
            health_log_interval: Duration::from_millis(60_000),
            topic_posted: "transaction-posted".to_string(),
            topic_reversed: "transaction-reversed".to_string(),
        }
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayTick {
    pub fetched: usize,
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Row counts surfaced as health metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxHealth {
    pub pending: u64,
    pub failed: u64,
}

pub struct OutboxRelay<S, B> {
    store: Arc<S>,
    bus: Arc<B>,
    clock: Arc<dyn Clock>,
    config: RelayConfig,
}

impl<S, B> OutboxRelay<S, B>
where
    S: LedgerStore,
    B: BusClient + 'static,
{
    pub fn new(store: Arc<S>, bus: Arc<B>, clock: Arc<dyn Clock>, config: RelayConfig) -> Self {
        Self {
            store,
            bus,
            clock,
            config,
        }
    }

    /// One poll: claim a batch, publish each record, persist outcomes.
    pub async fn tick(&self) -> LedgerResult<RelayTick> {
        let mut txn = self.store.begin().await?;
        let batch = self
            .store
            .fetch_pending_outbox(&mut txn, self.config.batch_size)
            .await?;

        let mut report = RelayTick {
            fetched: batch.len(),
            ..RelayTick::default()
        };

        if batch.is_empty() {
            self.store.commit(txn).await?;
            debug!("no pending outbox events");
            return Ok(report);
        }

        info!(count = batch.len(), "processing pending outbox events");

        for mut record in batch {
            match self.publish_record(&record).await {
                Ok(()) => {
                    record.mark_processed(self.clock.now());
                    report.published += 1;
                    info!(
                        record_id = %record.record_id,
                        aggregate_id = %record.aggregate_id,
                        event_type = record.event_type.as_str(),
                        "published outbox event"
                    );
                }
                Err(reason) => {
                    record.record_failure(reason.as_str(), self.config.max_attempts);
                    if record.status == OutboxStatus::Failed {
                        report.failed += 1;
                        error!(
                            record_id = %record.record_id,
                            attempts = record.attempts,
                            reason,
                            "outbox event exhausted retries, parked as FAILED"
                        );
                    } else {
                        report.retried += 1;
                        warn!(
                            record_id = %record.record_id,
                            attempts = record.attempts,
                            reason,
                            "outbox publish failed, will retry"
                        );
                    }
                }
            }
            self.store.update_outbox(&mut txn, &record).await?;
        }

        self.store.commit(txn).await?;
        Ok(report)
    }

    /// Decode the payload per its event type (validating the stored bytes),
    /// pick the destination topic, and publish keyed by aggregate id.
    async fn publish_record(&self, record: &OutboxRecord) -> Result<(), String> {
        let (topic, payload) = match record.event_type {
            OutboxEventType::TransactionPosted => {
                let event = TransactionPosted::decode(&record.payload)
                    .map_err(|e| format!("payload decode: {e}"))?;
                let bytes = event.encode().map_err(|e| e.to_string())?;
                (self.config.topic_posted.as_str(), bytes)
            }
            OutboxEventType::TransactionReversed => {
                let event = TransactionReversed::decode(&record.payload)
                    .map_err(|e| format!("payload decode: {e}"))?;
                let bytes = event.encode().map_err(|e| e.to_string())?;
                (self.config.topic_reversed.as_str(), bytes)
            }
        };

        let key = record.aggregate_id.to_string();
        match tokio::time::timeout(
            self.config.per_attempt_timeout,
            self.bus.publish(topic, &key, &payload),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(BusError::Timeout.to_string()),
        }
    }

    /// Count rows by status and log; no row locks taken.
    pub async fn health_check(&self) -> LedgerResult<OutboxHealth> {
        let mut txn = self.store.begin().await?;
        let pending = self
            .store
            .count_outbox_by_status(&mut txn, OutboxStatus::Pending)
            .await?;
        let failed = self
            .store
            .count_outbox_by_status(&mut txn, OutboxStatus::Failed)
            .await?;
        self.store.commit(txn).await?;

        if pending > 0 || failed > 0 {
            info!(pending, failed, "outbox status");
        }
        if failed > 0 {
            warn!(failed, "outbox has FAILED events requiring manual intervention");
        }

        Ok(OutboxHealth { pending, failed })
    }

    /// Spawn the polling loop plus the health cadence as one worker.
    ///
    /// Designed as a single active instance; skip-locked claims keep an
    /// accidental second instance safe, but shard coordination is left to
    /// deployment.
    pub fn spawn(self: Arc<Self>) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = shutdown_channel();

        let join = tokio::spawn(async move {
            let mut poll = tokio::time::interval(self.config.poll_interval);
            poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut health = tokio::time::interval(self.config.health_log_interval);
            health.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("outbox relay shutting down");
                        return;
                    }
                    _ = poll.tick() => {
                        if let Err(err) = self.tick().await {
                            error!(%err, "outbox poll failed");
                        }
                    }
                    _ = health.tick() => {
                        if let Err(err) = self.health_check().await {
                            error!(%err, "outbox health check failed");
                        }
                    }
                }
            }
        });

        WorkerHandle::new(shutdown_tx, join)
    }
}
