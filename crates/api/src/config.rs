//! Application configuration.
//!
//! Defaults carry the documented values; the environment overrides
//! individual keys (`LEDGERD_*`, plus the conventional `DATABASE_URL` /
//! `REDIS_URL` / `BIND_ADDR`). Configuration is read once at startup and
//! injected at construction; nothing re-reads the environment later.

use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;

use ledgerd_engine::{RelayConfig, SnapshotWorkerConfig};
use ledgerd_store::IsolationLevel;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub outbox: OutboxConfig,
    pub snapshots: SnapshotsConfig,
    pub bus: BusConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    /// Per-request deadline; expiry rolls the store transaction back.
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    pub poll_interval_ms: u64,
    pub batch_size: u32,
    pub max_attempts: u32,
    pub per_attempt_timeout_ms: u64,
    pub health_log_interval_ms: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            batch_size: 100,
            max_attempts: 5,
            per_attempt_timeout_ms: 10_000,
            health_log_interval_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotsConfig {
    /// How often the worker checks for a day rollover.
    pub check_interval_ms: u64,
    /// Fixed offset (`+HH:MM` / `-HH:MM`) defining "end of previous day".
    pub cutoff_offset: String,
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 60_000,
            cutoff_offset: "+00:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub topic_posted: String,
    pub topic_reversed: String,
    pub redis_url: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic_posted: "transaction-posted".to_string(),
            topic_reversed: "transaction-reversed".to_string(),
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Postgres URL; absent means the in-memory dev store.
    pub url: Option<String>,
    pub max_connections: u32,
    /// `serializable` (default) or `snapshot`.
    pub isolation: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            isolation: "serializable".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        override_env(&mut config.http.bind_addr, "BIND_ADDR");
        override_parsed(&mut config.http.request_timeout_ms, "LEDGERD_HTTP_REQUEST_TIMEOUT_MS");

        override_parsed(&mut config.outbox.poll_interval_ms, "LEDGERD_OUTBOX_POLL_INTERVAL_MS");
        override_parsed(&mut config.outbox.batch_size, "LEDGERD_OUTBOX_BATCH_SIZE");
        override_parsed(&mut config.outbox.max_attempts, "LEDGERD_OUTBOX_MAX_ATTEMPTS");
        override_parsed(
            &mut config.outbox.per_attempt_timeout_ms,
            "LEDGERD_OUTBOX_PER_ATTEMPT_TIMEOUT_MS",
        );
        override_parsed(
            &mut config.outbox.health_log_interval_ms,
            "LEDGERD_OUTBOX_HEALTH_LOG_INTERVAL_MS",
        );

        override_parsed(
            &mut config.snapshots.check_interval_ms,
            "LEDGERD_SNAPSHOTS_CHECK_INTERVAL_MS",
        );
        override_env(&mut config.snapshots.cutoff_offset, "LEDGERD_SNAPSHOTS_CUTOFF_OFFSET");

        override_env(&mut config.bus.topic_posted, "LEDGERD_BUS_TOPIC_POSTED");
        override_env(&mut config.bus.topic_reversed, "LEDGERD_BUS_TOPIC_REVERSED");
        config.bus.redis_url = std::env::var("REDIS_URL").ok().or(config.bus.redis_url);

        config.store.url = std::env::var("DATABASE_URL").ok().or(config.store.url);
        override_parsed(&mut config.store.max_connections, "LEDGERD_STORE_MAX_CONNECTIONS");
        override_env(&mut config.store.isolation, "LEDGERD_STORE_ISOLATION");

        config
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.http.request_timeout_ms)
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            poll_interval: Duration::from_millis(self.outbox.poll_interval_ms),
            batch_size: self.outbox.batch_size,
            max_attempts: self.outbox.max_attempts,
            per_attempt_timeout: Duration::from_millis(self.outbox.per_attempt_timeout_ms),
            health_log_interval: Duration::from_millis(self.outbox.health_log_interval_ms),
            topic_posted: self.bus.topic_posted.clone(),
            topic_reversed: self.bus.topic_reversed.clone(),
        }
    }

    pub fn snapshot_worker_config(&self) -> Result<SnapshotWorkerConfig, String> {
        Ok(SnapshotWorkerConfig {
            check_interval: Duration::from_millis(self.snapshots.check_interval_ms),
            cutoff_offset: parse_offset(&self.snapshots.cutoff_offset)?,
        })
    }

    pub fn isolation_level(&self) -> Result<IsolationLevel, String> {
        match self.store.isolation.to_ascii_lowercase().as_str() {
            "serializable" => Ok(IsolationLevel::Serializable),
            "snapshot" => Ok(IsolationLevel::Snapshot),
            other => Err(format!(
                "store.isolation must be 'serializable' or 'snapshot', got '{other}'"
            )),
        }
    }
}

fn override_env(slot: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *slot = value;
    }
}

fn override_parsed<T: core::str::FromStr>(slot: &mut T, key: &str) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, raw, "ignoring unparsable config override"),
        }
    }
}

/// Parse `±HH:MM` into a fixed offset.
fn parse_offset(raw: &str) -> Result<FixedOffset, String> {
    let err = || format!("cutoff offset must look like +HH:MM or -HH:MM, got '{raw}'");

    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1i32, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (-1i32, rest)
    } else {
        return Err(err());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(err)?;
    let hours: i32 = hours.parse().map_err(|_| err())?;
    let minutes: i32 = minutes.parse().map_err(|_| err())?;
    if hours > 14 || minutes > 59 {
        return Err(err());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(err)
}
