//! Redis pub/sub-backed bus client (optional).
//!
//! Redis pub/sub is not durable; at-least-once end to end still holds
//! because the outbox row is only marked processed after the PUBLISH
//! succeeds. Deployments needing a durable broker swap in their own
//! `BusClient` implementation.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Serialize;

use crate::bus::{BusClient, BusError};

#[derive(Serialize)]
struct RedisEnvelope<'a> {
    key: &'a str,
    payload: &'a serde_json::value::RawValue,
}

/// Publishes each event as a JSON envelope on the topic-named channel.
#[derive(Debug, Clone)]
pub struct RedisBusClient {
    client: redis::Client,
}

impl RedisBusClient {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| BusError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BusClient for RedisBusClient {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError> {
        let raw = core::str::from_utf8(payload)
            .ok()
            .and_then(|s| serde_json::from_str::<&serde_json::value::RawValue>(s).ok())
            .ok_or_else(|| BusError::Transport("payload is not valid JSON".to_string()))?;

        let envelope = serde_json::to_string(&RedisEnvelope { key, payload: raw })
            .map_err(|e| BusError::Transport(e.to_string()))?;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::Transport(e.to_string()))?;

        let _: i64 = conn
            .publish(topic, envelope)
            .await
            .map_err(|e| BusError::Transport(e.to_string()))?;

        Ok(())
    }
}
