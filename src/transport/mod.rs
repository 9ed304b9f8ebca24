// src/transport/mod.rs

//! HTTP transport to the agent.

pub mod connection;
pub mod stream;

pub use connection::Connection;
pub use stream::EventStream;
