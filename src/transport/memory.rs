// src/transport/memory.rs

//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain
//! `Transport` trait. It is intended for testing, and it defines the
//! **reference behavior** for the transport layer: frames are delivered
//! whole, strictly in the order they were injected, and the inbox channel
//! closes when the remote side goes away. Network transports are expected
//! to approximate this behavior as closely as their underlying systems
//! allow.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use crate::{Error, FrameInbox, Result, Transport, TransportPtr};

/// The far side of an in-memory connection.
///
/// Plays the role of the kernel backend: read what the client sent from
/// `outbound`, inject reply frames through `inbound`. Dropping the handle
/// closes the connection from the remote end, which the client observes as
/// its inbox closing.
///
/// # Testing Only - Subject to Change
///
/// This type is exposed for `kernel-rpc`'s own integration tests and for
/// callers writing scripted-backend tests. It may change without a
/// deprecation cycle.
pub struct MemoryRemote {
    // ---
    /// Frames the client sent, in send order.
    pub outbound: mpsc::Receiver<Bytes>,

    /// Inject frames for the client to receive.
    pub inbound: mpsc::Sender<Bytes>,
}

struct MemoryTransport {
    // ---
    outbound: Mutex<Option<mpsc::Sender<Bytes>>>,
    frames: Mutex<Option<FrameInbox>>,
}

/// Create a connected in-memory transport pair.
///
/// Returns the client-facing [`TransportPtr`] and the [`MemoryRemote`]
/// that scripts the other end.
///
/// # Example
///
/// ```
/// use kernel_rpc::{create_memory_transport, Transport};
/// use bytes::Bytes;
///
/// # async fn example() -> kernel_rpc::Result<()> {
/// let (transport, mut remote) = create_memory_transport();
///
/// transport.send(Bytes::from_static(b"{}")).await?;
/// let sent = remote.outbound.recv().await.expect("nothing sent");
/// assert_eq!(sent, Bytes::from_static(b"{}"));
/// # Ok(())
/// # }
/// ```
pub fn create_transport() -> (TransportPtr, MemoryRemote) {
    // ---
    let (outbound_tx, outbound_rx) = mpsc::channel(64);
    let (inbound_tx, inbound_rx) = mpsc::channel(64);

    let transport = Arc::new(MemoryTransport {
        outbound: Mutex::new(Some(outbound_tx)),
        frames: Mutex::new(Some(FrameInbox { inbox: inbound_rx })),
    });

    let remote = MemoryRemote {
        outbound: outbound_rx,
        inbound: inbound_tx,
    };

    (transport, remote)
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---

    async fn send(&self, frame: Bytes) -> Result<()> {
        // ---
        let guard = self.outbound.lock().await;
        let sender = guard
            .as_ref()
            .ok_or_else(|| Error::Transport("transport closed".to_string()))?;

        sender
            .send(frame)
            .await
            .map_err(|_| Error::Send("remote endpoint dropped".to_string()))
    }

    async fn frames(&self) -> Result<FrameInbox> {
        // ---
        self.frames
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Transport("inbound half already claimed".to_string()))
    }

    async fn close(&self) -> Result<()> {
        // ---
        // Dropping the sender is what the remote observes as a close.
        self.outbound.lock().await.take();
        Ok(())
    }
}
