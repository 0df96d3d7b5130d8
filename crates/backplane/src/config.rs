use std::{env, time::Duration};

/// Adapter configuration loaded from environment variables.
///
/// The connection string itself comes from the CLI (`--url` / `REDIS_URL`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the connection event channel (default: 64)
    pub event_capacity: usize,
    /// Delay between resubscribe attempts in milliseconds (default: 1,000)
    pub reconnect_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BACKPLANE_EVENT_CAPACITY` - Event channel capacity (default: 64)
    /// - `BACKPLANE_RECONNECT_DELAY_MS` - Resubscribe delay (default: 1,000)
    pub fn from_env() -> Self {
        Self {
            event_capacity: env::var("BACKPLANE_EVENT_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(64),
            reconnect_delay_ms: env::var("BACKPLANE_RECONNECT_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_000),
        }
    }

    /// Connection tuning derived from this configuration.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            event_capacity: self.event_capacity,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Settings shared by the connection backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub event_capacity: usize,
    pub reconnect_delay: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            event_capacity: 64,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}
