use thiserror::Error;

/// Errors that can occur while decoding a channel payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unexpected end of message while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("Invalid message id: {0}")]
    InvalidId(String),
    #[error("Negative payload length: {0}")]
    NegativeLength(i32),
}

/// Errors that can occur while framing a payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Payload of {0} bytes exceeds the 2147483647 byte frame limit")]
    PayloadTooLarge(usize),
}
