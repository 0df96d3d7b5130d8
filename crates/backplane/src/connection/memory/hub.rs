//! Shared state standing in for a Redis server.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};

/// Channel capacity for pub/sub messages.
const CHANNEL_CAPACITY: usize = 100;

/// In-process stand-in for a Redis server.
///
/// Holds the pub/sub channels and the per-database sequence counters used
/// by the publish script.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
    counters: Arc<Mutex<HashMap<(u32, String), u64>>>,
}

impl MemoryHub {
    /// Creates a new empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets or creates the channel with the given name.
    pub(crate) async fn channel(&self, name: &str) -> broadcast::Sender<Vec<u8>> {
        // Try read lock first to avoid write contention
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(name) {
                return sender.clone();
            }
        }

        let mut channels = self.channels.write().await;

        // Double-check after acquiring write lock
        if let Some(sender) = channels.get(name) {
            return sender.clone();
        }

        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        channels.insert(name.to_string(), sender.clone());
        sender
    }

    /// Publishes `payload` and returns the number of receivers reached.
    pub(crate) async fn publish(&self, name: &str, payload: Vec<u8>) -> usize {
        self.channel(name).await.send(payload).unwrap_or(0)
    }

    /// Increments the counter stored at `key` in `database`.
    pub(crate) async fn incr(&self, database: u32, key: &str) -> u64 {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry((database, key.to_string())).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Current value of the counter at `key` in `database`.
    pub async fn counter(&self, database: u32, key: &str) -> Option<u64> {
        self.counters
            .lock()
            .await
            .get(&(database, key.to_string()))
            .copied()
    }
}
