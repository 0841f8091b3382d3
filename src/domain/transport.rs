// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the domain-level connection interface used by the
//! correlation engine. It intentionally avoids any reference to concrete
//! protocols or client libraries.
//!
//! The transport layer is responsible only for moving opaque frame bytes
//! across one persistent duplex connection. Higher-level semantics such as
//! frame decoding, correlation, and timeouts are handled elsewhere.
//!
//! Concrete implementations of this interface live under `src/transport/`.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Result;

/// Handle to the inbound half of a connection.
///
/// Frames arrive in the order the remote end produced them. The channel
/// closing means the connection closed or failed; the transport does not
/// deliver partial frames.
///
/// A connection hands this out exactly once (see [`Transport::frames`]),
/// which is what keeps reads single-consumer: one background task owns the
/// inbox while senders go through [`Transport::send`].
#[derive(Debug)]
pub struct FrameInbox {
    // ---
    /// Receiver channel for raw inbound frames.
    pub inbox: mpsc::Receiver<Bytes>,
}

/// Duplex frame connection abstraction.
///
/// A `Transport` represents one established connection to a kernel. It
/// makes no assumptions about frame contents; encoding and correlation are
/// defined by the protocol layer.
///
/// Implementations must ensure that:
/// - `send()` delivers whole frames; a send that returns `Ok` was handed to
///   the underlying connection in full.
/// - Inbound frames are delivered to the [`FrameInbox`] strictly in arrival
///   order, with no concurrent delivery.
/// - After the underlying connection closes or fails, the inbox channel
///   closes rather than blocking forever.
///
/// The in-memory transport serves as the reference implementation of these
/// semantics.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Send one frame over the connection.
    async fn send(&self, frame: Bytes) -> Result<()>;

    /// Claim the inbound half of the connection.
    ///
    /// Returns `Error::Transport` if the inbound half was already claimed;
    /// a connection has exactly one reader.
    async fn frames(&self) -> Result<FrameInbox>;

    /// Close the connection and release any associated resources.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// This is an `Arc<dyn Transport>`, which means:
/// - `.clone()` is cheap (only increments a reference count)
/// - Multiple clones share the same underlying connection
/// - Used to erase concrete transport types behind a stable domain interface.
pub type TransportPtr = Arc<dyn Transport>;
