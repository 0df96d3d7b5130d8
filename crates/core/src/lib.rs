//! Core types for the backplane Redis scale-out adapter.
//!
//! Everything in this crate is pure: the connection trait and its events,
//! the scale-out message codec, the publish script and connection-string
//! parsing. The `backplane` crate provides the implementations that talk
//! to a server.

pub mod connection;
pub mod message;
pub mod options;
pub mod script;
