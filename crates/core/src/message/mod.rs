//! Scale-out message codec.
//!
//! A channel payload is the sequence id written as ASCII digits, a single
//! space, a 4-byte little-endian length and that many payload bytes:
//!
//! ```text
//! 42 \x05\x00\x00\x00hello
//! ```

mod error;
mod types;

pub use error::{DecodeError, EncodeError};
pub use types::RedisMessage;
