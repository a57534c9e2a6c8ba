//! Bus publish abstraction (mechanics only).
//!
//! The relay is the only producer. Publishing is awaited so the caller can
//! mark the outbox row only after the broker acknowledged.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The per-attempt timeout elapsed before the broker acknowledged.
    #[error("publish timed out")]
    Timeout,

    /// Anything transport-level: connection refused, broker error, etc.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Asynchronous publish to a named topic with a partition key.
#[async_trait]
pub trait BusClient: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError>;
}

#[async_trait]
impl<B> BusClient for Arc<B>
where
    B: BusClient + ?Sized,
{
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError> {
        (**self).publish(topic, key, payload).await
    }
}
