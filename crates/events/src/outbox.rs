//! Transactional outbox record.
//!
//! A record is created in the same durable transaction as its aggregate, so
//! the event exists iff the ledger data exists. The relay drives the record
//! through PENDING -> PROCESSED, or PENDING -> FAILED once the attempts
//! ceiling is reached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerd_core::{LedgerError, OutboxRecordId, TransactionId};

/// Event type discriminator stored on the row; selects payload schema and
/// destination topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxEventType {
    TransactionPosted,
    TransactionReversed,
}

impl OutboxEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxEventType::TransactionPosted => "TRANSACTION_POSTED",
            OutboxEventType::TransactionReversed => "TRANSACTION_REVERSED",
        }
    }
}

impl core::str::FromStr for OutboxEventType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRANSACTION_POSTED" => Ok(OutboxEventType::TransactionPosted),
            "TRANSACTION_REVERSED" => Ok(OutboxEventType::TransactionReversed),
            other => Err(LedgerError::internal(format!(
                "unknown outbox event type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxStatus {
    Pending,
    Processed,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Processed => "PROCESSED",
            OutboxStatus::Failed => "FAILED",
        }
    }
}

impl core::str::FromStr for OutboxStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OutboxStatus::Pending),
            "PROCESSED" => Ok(OutboxStatus::Processed),
            "FAILED" => Ok(OutboxStatus::Failed),
            other => Err(LedgerError::internal(format!(
                "unknown outbox status: {other}"
            ))),
        }
    }
}

/// One queued lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub record_id: OutboxRecordId,
    /// Transaction the event describes; also the bus partition key.
    pub aggregate_id: TransactionId,
    pub event_type: OutboxEventType,
    /// Opaque serialized payload; parsed only at publish time.
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    /// First successful publish instant; never overwritten.
    pub processed_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub status: OutboxStatus,
}

impl OutboxRecord {
    pub fn pending(
        aggregate_id: TransactionId,
        event_type: OutboxEventType,
        payload: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: OutboxRecordId::new(),
            aggregate_id,
            event_type,
            payload,
            created_at: now,
            processed_at: None,
            attempts: 0,
            last_error: None,
            status: OutboxStatus::Pending,
        }
    }

    /// Mark successfully published. Idempotent: repeated marks keep the
    /// first processed instant.
    pub fn mark_processed(&mut self, now: DateTime<Utc>) {
        self.status = OutboxStatus::Processed;
        if self.processed_at.is_none() {
            self.processed_at = Some(now);
        }
    }

    /// Record a failed publish attempt. Once `attempts` reaches
    /// `max_attempts` the record becomes FAILED and is left for operators.
    pub fn record_failure(&mut self, error: impl Into<String>, max_attempts: u32) {
        self.attempts += 1;
        self.last_error = Some(error.into());
        if self.attempts >= max_attempts {
            self.status = OutboxStatus::Failed;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> OutboxRecord {
        OutboxRecord::pending(
            TransactionId::new(),
            OutboxEventType::TransactionPosted,
            b"{}".to_vec(),
            Utc::now(),
        )
    }

    #[test]
    fn fresh_records_are_pending_with_zero_attempts() {
        let r = record();
        assert!(r.is_pending());
        assert_eq!(r.attempts, 0);
        assert!(r.processed_at.is_none());
    }

    #[test]
    fn mark_processed_keeps_first_instant() {
        let mut r = record();
        let t1 = Utc::now();
        r.mark_processed(t1);
        assert_eq!(r.status, OutboxStatus::Processed);
        assert_eq!(r.processed_at, Some(t1));

        r.mark_processed(t1 + Duration::seconds(30));
        assert_eq!(r.processed_at, Some(t1));
    }

    #[test]
    fn failures_accumulate_until_the_ceiling() {
        let mut r = record();
        r.record_failure("broker down", 3);
        r.record_failure("broker down", 3);
        assert!(r.is_pending());
        assert_eq!(r.attempts, 2);
        assert_eq!(r.last_error.as_deref(), Some("broker down"));

        r.record_failure("broker down", 3);
        assert_eq!(r.status, OutboxStatus::Failed);
        assert_eq!(r.attempts, 3);
    }

    #[test]
    fn event_types_round_trip_their_wire_names() {
        for t in [
            OutboxEventType::TransactionPosted,
            OutboxEventType::TransactionReversed,
        ] {
            assert_eq!(t.as_str().parse::<OutboxEventType>().unwrap(), t);
        }
    }
}
