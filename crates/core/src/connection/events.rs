use super::ConnectionError;

/// Notifications re-raised from the underlying client.
///
/// Every variant carries the error that triggered it. For
/// `ConnectionRestored` this is the failure that the restore recovers from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectionFailed(ConnectionError),
    ConnectionRestored(ConnectionError),
    ErrorMessage(ConnectionError),
}

impl ConnectionEvent {
    /// Builds an `ErrorMessage` event from a server-sent error message.
    pub fn error_message(message: impl Into<String>) -> Self {
        Self::ErrorMessage(ConnectionError::OperationFailed(message.into()))
    }

    /// The error attached to this event.
    pub fn error(&self) -> &ConnectionError {
        match self {
            Self::ConnectionFailed(e) | Self::ConnectionRestored(e) | Self::ErrorMessage(e) => e,
        }
    }

    /// Short name used in log fields and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "connection_failed",
            Self::ConnectionRestored(_) => "connection_restored",
            Self::ErrorMessage(_) => "error_message",
        }
    }
}
