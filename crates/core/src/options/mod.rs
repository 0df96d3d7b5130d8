//! Connection-string parsing.
//!
//! Accepts `redis://` / `rediss://` URLs and StackExchange-style
//! configuration strings such as
//! `cache-1:6380,password=secret,ssl=true,defaultDatabase=2`.

mod error;
mod types;

pub use error::{OptionsError, Result};
pub use types::{
    ConnectionOptions, Endpoint, DEFAULT_CONNECT_RETRY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT,
};
