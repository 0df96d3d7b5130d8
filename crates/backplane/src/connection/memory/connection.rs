use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

use backplane_core::connection::{
    BackplaneConnection, ConnectionError, ConnectionEvent, MessageHandler, Result, STREAM_INDEX,
};
use backplane_core::message::RedisMessage;
use backplane_core::options::ConnectionOptions;
use backplane_core::script::{ScriptReply, PUBLISH_SCRIPT};

use super::super::gate::CommandGate;
use super::super::monitor::LinkMonitor;
use super::MemoryHub;
use crate::config::ConnectionSettings;

/// In-memory backplane connection.
///
/// Behaves like [`RedisConnection`](crate::connection::RedisConnection)
/// for the publish script. Any other script fails with
/// `ConnectionError::ScriptFailed`.
pub struct MemoryConnection {
    hub: MemoryHub,
    latency: Option<Duration>,
    session: RwLock<Option<Arc<MemorySession>>>,
    events: broadcast::Sender<ConnectionEvent>,
    monitor: Arc<LinkMonitor>,
}

struct MemorySession {
    subscriptions: Mutex<HashMap<String, MemorySubscription>>,
    gate: CommandGate,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.gate.abort();
        for (_, subscription) in self.subscriptions.get_mut().drain() {
            subscription.task.abort();
        }
    }
}

struct MemorySubscription {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MemorySubscription {
    async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.task.await;
    }
}

impl MemoryConnection {
    /// Creates a connection on its own private hub.
    pub fn new() -> Self {
        Self::with_hub(MemoryHub::new(), ConnectionSettings::default())
    }

    /// Creates a connection on a shared hub.
    pub fn with_hub(hub: MemoryHub, settings: ConnectionSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let monitor = Arc::new(LinkMonitor::new(events.clone()));
        Self {
            hub,
            latency: None,
            session: RwLock::new(None),
            events,
            monitor,
        }
    }

    /// Delays every script evaluation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }

    /// Marks the link as down. Commands fail until [`restore_link`] is called.
    ///
    /// [`restore_link`]: MemoryConnection::restore_link
    pub fn fail_link(&self, reason: impl Into<String>) {
        self.monitor
            .report_failure(ConnectionError::ConnectionFailed(reason.into()));
    }

    /// Marks the link as up again.
    pub fn restore_link(&self) {
        self.monitor.report_success();
    }

    /// Forwards a server-style error message to event receivers.
    pub fn raise_error_message(&self, message: impl Into<String>) {
        self.monitor.report_error_message(message);
    }

    async fn current(&self) -> Result<Arc<MemorySession>> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(ConnectionError::NotStarted)
    }

    fn ensure_link(&self) -> Result<()> {
        if self.monitor.is_down() {
            return Err(ConnectionError::ConnectionFailed(
                "link is down".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackplaneConnection for MemoryConnection {
    async fn connect(&self, connection_string: &str) -> Result<()> {
        let options = ConnectionOptions::parse(connection_string)?;

        let session = Arc::new(MemorySession {
            subscriptions: Mutex::new(HashMap::new()),
            gate: CommandGate::new(),
        });
        self.session.write().await.replace(session);

        tracing::debug!(endpoint = ?options.endpoints.first(), "Connected to memory hub");
        Ok(())
    }

    async fn subscribe(&self, channel_key: &str, on_message: MessageHandler) -> Result<()> {
        let session = self.current().await?;
        self.ensure_link()?;

        let mut receiver = self.hub.channel(channel_key).await.subscribe();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let channel = channel_key.to_string();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    received = receiver.recv() => match received {
                        Ok(payload) => match RedisMessage::from_bytes(&payload) {
                            Ok(message) => on_message(STREAM_INDEX, message),
                            Err(e) => {
                                tracing::warn!(channel = %channel, error = %e, "Failed to decode scale-out message");
                            }
                        },
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(channel = %channel, skipped, "Subscriber lagged behind");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        let replaced = session.subscriptions.lock().await.insert(
            channel_key.to_string(),
            MemorySubscription {
                stop: stop_tx,
                task,
            },
        );
        if let Some(old) = replaced {
            old.stop().await;
        }

        Ok(())
    }

    async fn script_evaluate(
        &self,
        database: u32,
        script: &str,
        key: &str,
        argument: &[u8],
    ) -> Result<ScriptReply> {
        let session = self.current().await?;

        if script != PUBLISH_SCRIPT {
            let error = "NOSCRIPT only the publish script is available in memory";
            self.monitor.report_error_message(error);
            return Err(ConnectionError::ScriptFailed(error.to_string()));
        }

        session
            .gate
            .run(async {
                if let Some(latency) = self.latency {
                    tokio::time::sleep(latency).await;
                }
                self.ensure_link()?;

                let id = self.hub.incr(database, key).await;

                let mut payload = format!("{id} ").into_bytes();
                payload.extend_from_slice(argument);
                self.hub.publish(key, payload.clone()).await;

                Ok(ScriptReply::Array(vec![
                    ScriptReply::Int(id as i64),
                    ScriptReply::Data(argument.to_vec()),
                    ScriptReply::Data(payload),
                ]))
            })
            .await
    }

    async fn close(&self, key: &str, allow_pending_commands_to_complete: bool) -> Result<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };

        let subscription = session.subscriptions.lock().await.remove(key);
        if let Some(subscription) = subscription {
            subscription.stop().await;
        }

        if allow_pending_commands_to_complete {
            session.gate.drain().await;
        } else {
            session.gate.abort();
        }

        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}
