//! backplane - Redis scale-out connection adapter.
//!
//! Implements [`backplane_core::connection::BackplaneConnection`] on top of
//! the `redis` crate, plus an in-memory connection for tests and local runs.

pub mod cli;
pub mod config;
pub mod connection;
pub mod output;

pub use backplane_core::connection::{
    BackplaneConnection, ConnectionError, ConnectionEvent, MessageHandler, Result, STREAM_INDEX,
};
pub use backplane_core::message::RedisMessage;
pub use config::{Config, ConnectionSettings};
