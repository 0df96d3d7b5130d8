//! Forwards link-state changes and server errors as [`ConnectionEvent`]s.

use std::sync::Mutex;

use tokio::sync::broadcast;

use backplane_core::connection::{ConnectionError, ConnectionEvent};

/// Turns observed command and subscription outcomes into events.
///
/// A failure is raised once per outage: repeated failures while the link is
/// already down are not re-raised, and the first success afterwards raises
/// `ConnectionRestored` carrying the failure it recovers from.
#[derive(Debug)]
pub(crate) struct LinkMonitor {
    events: broadcast::Sender<ConnectionEvent>,
    outage: Mutex<Option<ConnectionError>>,
}

impl LinkMonitor {
    pub(crate) fn new(events: broadcast::Sender<ConnectionEvent>) -> Self {
        Self {
            events,
            outage: Mutex::new(None),
        }
    }

    pub(crate) fn report_failure(&self, error: ConnectionError) {
        let Ok(mut outage) = self.outage.lock() else {
            return;
        };
        if outage.is_some() {
            return;
        }
        *outage = Some(error.clone());
        drop(outage);

        tracing::warn!(error = %error, "Redis connection failed");
        self.send(ConnectionEvent::ConnectionFailed(error));
    }

    pub(crate) fn report_success(&self) {
        let restored = match self.outage.lock() {
            Ok(mut outage) => outage.take(),
            Err(_) => None,
        };

        if let Some(error) = restored {
            tracing::info!(previous_error = %error, "Redis connection restored");
            self.send(ConnectionEvent::ConnectionRestored(error));
        }
    }

    pub(crate) fn report_error_message(&self, message: impl Into<String>) {
        let event = ConnectionEvent::error_message(message);
        tracing::warn!(error = %event.error(), "Redis error message");
        self.send(event);
    }

    pub(crate) fn is_down(&self) -> bool {
        self.outage.lock().map(|o| o.is_some()).unwrap_or(false)
    }

    fn send(&self, event: ConnectionEvent) {
        // No receivers is fine - nobody is listening for events.
        let _ = self.events.send(event);
    }
}
