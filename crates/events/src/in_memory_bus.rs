//! In-memory bus for tests/dev.
//!
//! Records every delivery and supports failure injection so relay retry
//! behavior can be exercised without a broker.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::bus::{BusClient, BusError};

/// One recorded publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusDelivery {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Recording bus client.
///
/// While a failure is injected every publish returns it; deliveries resume
/// as soon as the failure is cleared.
#[derive(Debug, Default)]
pub struct InMemoryBusClient {
    deliveries: Mutex<Vec<BusDelivery>>,
    failure: Mutex<Option<BusError>>,
}

impl InMemoryBusClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent publish fails with `error` until [`Self::heal`].
    pub fn fail_with(&self, error: BusError) {
        *self.failure.lock().expect("bus lock poisoned") = Some(error);
    }

    pub fn heal(&self) {
        *self.failure.lock().expect("bus lock poisoned") = None;
    }

    pub fn deliveries(&self) -> Vec<BusDelivery> {
        self.deliveries.lock().expect("bus lock poisoned").clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.lock().expect("bus lock poisoned").len()
    }
}

#[async_trait]
impl BusClient for InMemoryBusClient {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError> {
        if let Some(err) = self.failure.lock().expect("bus lock poisoned").clone() {
            return Err(err);
        }
        self.deliveries
            .lock()
            .expect("bus lock poisoned")
            .push(BusDelivery {
                topic: topic.to_string(),
                key: key.to_string(),
                payload: payload.to_vec(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_deliveries_in_order() {
        let bus = InMemoryBusClient::new();
        bus.publish("t", "k1", b"a").await.unwrap();
        bus.publish("t", "k2", b"b").await.unwrap();

        let seen = bus.deliveries();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].key, "k1");
        assert_eq!(seen[1].key, "k2");
    }

    #[tokio::test]
    async fn injected_failure_blocks_until_healed() {
        let bus = InMemoryBusClient::new();
        bus.fail_with(BusError::Transport("broker down".into()));

        assert!(bus.publish("t", "k", b"x").await.is_err());
        assert_eq!(bus.delivery_count(), 0);

        bus.heal();
        bus.publish("t", "k", b"x").await.unwrap();
        assert_eq!(bus.delivery_count(), 1);
    }
}
