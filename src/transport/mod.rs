//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Transport` trait. The network transport is hidden behind a feature
//! flag and exposed only through its constructor function; the in-memory
//! transport is always available as the reference implementation.
//!
//! Domain code must not depend on transport-specific types.

mod memory;

#[cfg(feature = "transport_websocket")]
mod websocket;

pub use memory::{create_transport as create_memory_transport, MemoryRemote};

#[cfg(feature = "transport_websocket")]
pub use websocket::create_transport as create_websocket_transport;
