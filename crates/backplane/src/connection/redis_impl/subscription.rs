//! Background task driving one channel subscription.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use backplane_core::connection::{ConnectionError, MessageHandler, STREAM_INDEX};
use backplane_core::message::RedisMessage;

use super::super::monitor::LinkMonitor;

/// Handle to a running subscription task.
pub(crate) struct Subscription {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Spawns the task over an already subscribed `pubsub` connection.
    pub(crate) fn spawn(
        client: redis::Client,
        channel: String,
        handler: MessageHandler,
        monitor: Arc<LinkMonitor>,
        reconnect_delay: Duration,
        pubsub: redis::aio::PubSub,
    ) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let context = SubscriptionContext {
            client,
            channel,
            handler,
            monitor,
            reconnect_delay,
        };

        let task = tokio::spawn(run_subscription_loop(context, pubsub, stop_rx));

        Self {
            stop: Some(stop_tx),
            task,
        }
    }

    /// Unsubscribes and waits for the task to finish.
    pub(crate) async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "Subscription task panicked");
            }
        }
    }

    pub(crate) fn abort(&self) {
        self.task.abort();
    }
}

struct SubscriptionContext {
    client: redis::Client,
    channel: String,
    handler: MessageHandler,
    monitor: Arc<LinkMonitor>,
    reconnect_delay: Duration,
}

enum LoopExit {
    Stopped,
    StreamEnded,
}

/// Runs the subscription loop, resubscribing whenever the stream ends.
async fn run_subscription_loop(
    context: SubscriptionContext,
    mut pubsub: redis::aio::PubSub,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        match forward_messages(&context, &mut pubsub, &mut stop).await {
            LoopExit::Stopped => {
                if let Err(e) = pubsub.unsubscribe(&context.channel).await {
                    tracing::debug!(channel = %context.channel, error = %e, "Unsubscribe failed");
                }
                tracing::debug!(channel = %context.channel, "Subscription stopped");
                return;
            }
            LoopExit::StreamEnded => {
                tracing::info!(channel = %context.channel, "Redis subscription stream ended");
                context.monitor.report_failure(ConnectionError::ConnectionFailed(format!(
                    "subscription stream for '{}' ended",
                    context.channel
                )));

                match resubscribe(&context, &mut stop).await {
                    Some(restored) => {
                        pubsub = restored;
                        context.monitor.report_success();
                    }
                    None => return,
                }
            }
        }
    }
}

async fn forward_messages(
    context: &SubscriptionContext,
    pubsub: &mut redis::aio::PubSub,
    stop: &mut oneshot::Receiver<()>,
) -> LoopExit {
    let mut stream = pubsub.on_message();

    loop {
        tokio::select! {
            _ = &mut *stop => return LoopExit::Stopped,
            msg = stream.next() => match msg {
                Some(msg) => deliver(context, msg.get_payload_bytes()),
                None => return LoopExit::StreamEnded,
            },
        }
    }
}

fn deliver(context: &SubscriptionContext, payload: &[u8]) {
    match RedisMessage::from_bytes(payload) {
        Ok(message) => (context.handler)(STREAM_INDEX, message),
        Err(e) => {
            tracing::warn!(
                channel = %context.channel,
                error = %e,
                len = payload.len(),
                "Failed to decode scale-out message"
            );
        }
    }
}

/// Reconnects until subscribed again. Returns `None` when stopped first.
async fn resubscribe(
    context: &SubscriptionContext,
    stop: &mut oneshot::Receiver<()>,
) -> Option<redis::aio::PubSub> {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            _ = &mut *stop => return None,
            _ = tokio::time::sleep(context.reconnect_delay) => {}
        }

        attempt += 1;

        let result = async {
            let mut pubsub = context.client.get_async_pubsub().await?;
            pubsub.subscribe(&context.channel).await?;
            Ok::<_, redis::RedisError>(pubsub)
        }
        .await;

        match result {
            Ok(pubsub) => {
                tracing::info!(channel = %context.channel, attempt, "Resubscribed to channel");
                return Some(pubsub);
            }
            Err(e) => {
                tracing::warn!(
                    channel = %context.channel,
                    attempt,
                    error = %e,
                    "Resubscribe failed"
                );
            }
        }
    }
}
