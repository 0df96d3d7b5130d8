//! In-memory connection backend.
//!
//! Channels are tokio broadcast channels held by a [`MemoryHub`]; connections
//! sharing a hub see each other's publishes, the way nodes sharing one Redis
//! server do.

mod connection;
mod hub;

pub use connection::MemoryConnection;
pub use hub::MemoryHub;
