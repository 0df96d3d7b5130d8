//! Redis connection backend.
//!
//! Command traffic goes through `redis::aio::ConnectionManager`, one per
//! logical database, which reconnects on its own. Each subscription owns a
//! dedicated `redis::aio::PubSub` connection driven by a background task.

mod connection;
mod error;
mod reply;
mod subscription;

pub use connection::RedisConnection;
