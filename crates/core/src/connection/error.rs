use thiserror::Error;

/// Errors that can occur during backplane connection operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("The redis connection has not been started.")]
    NotStarted,
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Script evaluation failed: {0}")]
    ScriptFailed(String),
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),
    #[error("Redis operation failed: {0}")]
    OperationFailed(String),
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),
    #[error("The redis connection was closed")]
    Closed,
}

impl ConnectionError {
    /// Returns true for errors that mean the link to the server is unusable.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Closed)
    }
}

/// Result type for connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
