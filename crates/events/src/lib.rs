//! Lifecycle events for the ledger: wire payload schemas, the transactional
//! outbox record, and the bus publish contract.
//!
//! At-least-once delivery is the contract; consumers must dedupe.

pub mod bus;
pub mod in_memory_bus;
pub mod outbox;
pub mod payloads;
#[cfg(feature = "redis")]
pub mod redis_bus;

pub use bus::{BusClient, BusError};
pub use in_memory_bus::{BusDelivery, InMemoryBusClient};
pub use outbox::{OutboxEventType, OutboxRecord, OutboxStatus};
pub use payloads::{PostedEntry, TransactionPosted, TransactionReversed};
#[cfg(feature = "redis")]
pub use redis_bus::RedisBusClient;
