//! Connection backend implementations.
//!
//! This module provides concrete implementations of the connection trait
//! defined in `backplane_core::connection`. Backends are selected at compile
//! time via feature flags.
//!
//! # Feature Flags
//!
//! - `redis` (default): Redis connection using the redis crate
//! - `memory` (default): In-process connection using tokio broadcast channels

#[cfg(not(any(feature = "memory", feature = "redis")))]
compile_error!(
    "No connection backend selected. Enable 'memory' or 'redis' feature. \
    Example: cargo build -p backplane --features redis"
);

mod gate;
mod monitor;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

#[cfg(feature = "memory")]
pub use memory::{MemoryConnection, MemoryHub};

#[cfg(feature = "redis")]
pub use redis_impl::RedisConnection;
