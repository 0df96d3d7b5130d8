use thiserror::Error;

use crate::connection::ConnectionError;

/// Errors that can occur while parsing a connection string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("Connection string is empty")]
    Empty,
    #[error("Connection string has no endpoint")]
    NoEndpoint,
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("Invalid value '{value}' for option '{key}'")]
    InvalidValue { key: String, value: String },
    #[error("Invalid redis URL: {0}")]
    InvalidUrl(String),
}

/// Result type for option parsing.
pub type Result<T> = std::result::Result<T, OptionsError>;

impl From<OptionsError> for ConnectionError {
    fn from(err: OptionsError) -> Self {
        ConnectionError::InvalidConnectionString(err.to_string())
    }
}
