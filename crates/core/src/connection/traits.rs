use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::message::RedisMessage;
use crate::script::ScriptReply;

use super::{ConnectionEvent, Result};

/// Index of the scale-out stream delivered to message handlers.
///
/// A Redis backplane carries a single stream, so this is always `0`.
pub const STREAM_INDEX: usize = 0;

/// Callback invoked once per decoded message with `(stream_index, message)`.
pub type MessageHandler = Arc<dyn Fn(usize, RedisMessage) + Send + Sync>;

/// Narrow connection interface used by the scale-out message bus.
#[async_trait]
pub trait BackplaneConnection: Send + Sync {
    /// Connects to a Redis deployment.
    ///
    /// `connection_string` is either a `redis://` URL or a StackExchange-style
    /// configuration string (`host:port,password=...,ssl=true`).
    async fn connect(&self, connection_string: &str) -> Result<()>;

    /// Subscribes to `channel_key`, invoking `on_message` once per message.
    async fn subscribe(&self, channel_key: &str, on_message: MessageHandler) -> Result<()>;

    /// Evaluates `script` on `database` with `KEYS[1] = key` and
    /// `ARGV[1] = argument`.
    async fn script_evaluate(
        &self,
        database: u32,
        script: &str,
        key: &str,
        argument: &[u8],
    ) -> Result<ScriptReply>;

    /// Unsubscribes from `key` and tears the connection down.
    ///
    /// With `allow_pending_commands_to_complete` set, waits for in-flight
    /// commands first. Otherwise they resolve with `ConnectionError::Closed`.
    async fn close(&self, key: &str, allow_pending_commands_to_complete: bool) -> Result<()>;

    /// Returns a receiver for connection-failed, connection-restored and
    /// error-message notifications.
    fn events(&self) -> broadcast::Receiver<ConnectionEvent>;
}
