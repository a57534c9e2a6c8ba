//! Balance snapshot creation.
//!
//! Each account snapshot runs in its own store transaction so one failure
//! never aborts the batch. The daily worker computes the cutoff as the end
//! of the previous day in a configured fixed offset.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use tracing::{error, info, warn};

use ledgerd_core::{AccountId, Clock, LedgerError, LedgerResult};
use ledgerd_ledger::BalanceSnapshot;
use ledgerd_store::{LedgerStore, StoreError};

use crate::balance::BalanceEngine;
use crate::worker::{shutdown_channel, WorkerHandle};

#[derive(Debug, Clone)]
pub struct SnapshotWorkerConfig {
    /// How often the worker checks whether a new day has started.
    pub check_interval: Duration,
    /// Offset whose midnight defines "end of previous day".
    pub cutoff_offset: FixedOffset,
}

impl Default for SnapshotWorkerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            cutoff_offset: FixedOffset::east_opt(0).expect("zero offset is valid"),
        }
    }
}

pub struct SnapshotMaker<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    balances: BalanceEngine<S>,
}

impl<S: LedgerStore> SnapshotMaker<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let balances = BalanceEngine::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            balances,
        }
    }

    /// Snapshot every ACTIVE account at `cutoff`. Accounts that already have
    /// a snapshot at exactly `cutoff` are skipped; per-account failures are
    /// logged and do not abort the batch. Returns the number created.
    pub async fn create_snapshots(&self, cutoff: DateTime<Utc>) -> LedgerResult<u32> {
        if cutoff > self.clock.now() {
            return Err(LedgerError::invalid_arg(format!(
                "snapshot cutoff {cutoff} is in the future"
            )));
        }

        let account_ids = {
            let mut txn = self.store.begin().await?;
            let ids = self.store.list_active_account_ids(&mut txn).await?;
            self.store.commit(txn).await?;
            ids
        };

        info!(accounts = account_ids.len(), %cutoff, "starting snapshot batch");

        let mut created = 0;
        for account_id in account_ids {
            match self.create_snapshot_for_account(account_id, cutoff).await {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(%account_id, %cutoff, %err, "snapshot creation failed, continuing batch");
                }
            }
        }

        info!(created, %cutoff, "completed snapshot batch");
        Ok(created)
    }

    /// Snapshot a single account at `cutoff` in its own transaction.
    /// Returns false when a snapshot already existed at exactly `cutoff`.
    pub async fn create_snapshot_for_account(
        &self,
        account_id: AccountId,
        cutoff: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        let now = self.clock.now();
        if cutoff > now {
            return Err(LedgerError::invalid_arg(format!(
                "snapshot cutoff {cutoff} is in the future"
            )));
        }

        let mut txn = self.store.begin().await?;

        if self
            .store
            .find_snapshot_at(&mut txn, account_id, cutoff)
            .await?
            .is_some()
        {
            self.store.rollback(txn).await?;
            return Ok(false);
        }

        let account = self
            .store
            .find_account(&mut txn, account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let (balance, last_entry_id) = self.balances.compute(&mut txn, &account, cutoff).await?;
        let snapshot = BalanceSnapshot::create(account_id, balance, cutoff, last_entry_id, now)?;

        match self.store.insert_snapshot(&mut txn, &snapshot).await {
            Ok(()) => {
                self.store.commit(txn).await?;
                info!(%account_id, %cutoff, balance = %balance, "created balance snapshot");
                Ok(true)
            }
            // Another instance snapshotted the same cutoff concurrently.
            Err(StoreError::DuplicateSnapshot) => {
                self.store.rollback(txn).await?;
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Spawn the daily worker. On each day rollover (in the configured
    /// offset) it snapshots all accounts at the previous day's last instant.
    pub fn spawn_daily(self: Arc<Self>, config: SnapshotWorkerConfig) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = shutdown_channel();

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last_day = None;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("snapshot worker shutting down");
                        return;
                    }
                    _ = interval.tick() => {}
                }

                let today = self
                    .clock
                    .now()
                    .with_timezone(&config.cutoff_offset)
                    .date_naive();
                if last_day == Some(today) {
                    continue;
                }

                let Some(cutoff) = previous_day_end(today, config.cutoff_offset) else {
                    warn!(%today, "could not compute previous day end, skipping");
                    last_day = Some(today);
                    continue;
                };

                if let Err(err) = self.create_snapshots(cutoff).await {
                    error!(%cutoff, %err, "scheduled snapshot run failed");
                }
                last_day = Some(today);
            }
        });

        WorkerHandle::new(shutdown_tx, join)
    }
}

/// Last representable instant of the day before `today` in `offset`,
/// converted to UTC.
fn previous_day_end(today: chrono::NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let previous = today.pred_opt()?;
    let end = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)?;
    previous
        .and_time(end)
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_day_end_is_last_nanosecond_utc() {
        let day = "2026-03-10".parse::<chrono::NaiveDate>().unwrap();
        let end = previous_day_end(day, FixedOffset::east_opt(0).unwrap()).unwrap();
        assert_eq!(end.to_rfc3339(), "2026-03-09T23:59:59.999999999+00:00");
    }

    #[test]
    fn previous_day_end_respects_offset() {
        let day = "2026-03-10".parse::<chrono::NaiveDate>().unwrap();
        // UTC-03:00: local 23:59:59.999999999 is 02:59:59.999999999 next day UTC.
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let end = previous_day_end(day, offset).unwrap();
        assert_eq!(end.to_rfc3339(), "2026-03-10T02:59:59.999999999+00:00");
    }
}
