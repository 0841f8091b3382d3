// src/client/mod.rs

//! Kernel client implementation.
//!
//! This module contains the core [`KernelClient`] type which submits
//! execution requests to a kernel and correlates the streamed reply frames
//! back to the submitting caller.
//!
//! # Architecture
//!
//! The client claims the connection's inbound half once and runs a
//! background receive loop. Each request generates a fresh
//! `(msg_id, session)` identifier pair and registers a oneshot channel in
//! the outstanding-request slot. The receive loop decodes every inbound
//! frame in arrival order and delivers the first `stream` frame whose
//! `parent_header` carries *both* identifiers; everything else is discarded
//! silently. The caller of [`KernelClient::execute`] awaits the oneshot
//! until the loop resolves or fails it.
//!
//! # Concurrency
//!
//! One request is outstanding per connection at a time; a second `execute`
//! before the first resolves returns [`Error::RequestInFlight`]. The
//! receive loop is the only reader of the connection and the submitting
//! call is the only writer, so the two never contend on transport state.

mod pending;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use pending::{Outcome, Outstanding};

use crate::{
    // ---
    log_debug,
    log_warn,
    Error,
    ExecuteRequest,
    Frame,
    FrameInbox,
    KernelConfig,
    MessageId,
    Result,
    SessionId,
    TransportPtr,
    STREAM,
};

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// Mutex poisoning indicates that another task panicked while holding the
/// lock. The protected state here is the outstanding-request slot; there
/// are no invariants spanning multiple fields, and the worst outcome is a
/// dropped or unmatched reply. Connection-level failures are handled by
/// the receive loop.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Client for one kernel connection.
///
/// Cheap to clone (internally `Arc`-backed). Dropping the last clone ends
/// the background receive loop.
///
/// # Example
///
/// ```no_run
/// use kernel_rpc::{KernelClient, KernelConfig};
///
/// # async fn example() -> kernel_rpc::Result<()> {
/// let config = KernelConfig::new("wss://hub.example.com/user/user-1", "kernel-id")
///     .with_username("user-1")
///     .with_token("api-token");
///
/// let client = KernelClient::connect(config).await?;
/// let output = client.execute("ls /opt").await?;
/// println!("{output}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct KernelClient {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    transport: TransportPtr,
    config: KernelConfig,
    pending: Arc<Mutex<Outstanding>>,

    /// Set by the receive loop on its way out. Once true, the connection
    /// can never resolve another request.
    closed: Arc<AtomicBool>,

    /// Receive loop handle.
    ///
    /// We keep it so the task isn't detached invisibly, and so it can be
    /// extended later (shutdown, join-on-close, etc.).
    _rx_task: JoinHandle<()>,
}

impl KernelClient {
    // ---

    /// Connect to the kernel's channel endpoint and start the receive loop.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the configured endpoint does not
    /// parse, or `Error::Connect` if the WebSocket handshake fails.
    #[cfg(feature = "transport_websocket")]
    pub async fn connect(config: KernelConfig) -> Result<Self> {
        // ---
        let transport = crate::transport::create_websocket_transport(&config).await?;
        Self::with_transport(transport, config).await
    }

    /// Create a client over an explicitly provided transport.
    ///
    /// This is the constructor you want for tests and for advanced users.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the connection's inbound half was
    /// already claimed.
    pub async fn with_transport(transport: TransportPtr, config: KernelConfig) -> Result<Self> {
        // ---
        let frames = transport.frames().await?;

        let pending = Arc::new(Mutex::new(Outstanding::new()));
        let closed = Arc::new(AtomicBool::new(false));

        // The loop holds only a weak reference to the slot, so it exits
        // when the last client clone is dropped.
        let rx_task = tokio::spawn(listen(
            frames,
            Arc::downgrade(&pending),
            Arc::clone(&closed),
        ));

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                config,
                pending,
                closed,
                _rx_task: rx_task,
            }),
        })
    }

    /// Execute a shell command on the kernel and return its streamed output.
    ///
    /// Generates a fresh `(msg_id, session)` pair, sends one
    /// `execute_request` frame, and waits until the receive loop delivers
    /// the first `stream` frame whose parent identifiers both match.
    ///
    /// The wait is bounded by
    /// [`KernelConfig::request_timeout`](crate::KernelConfig) when set and
    /// unbounded otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `Error::RequestInFlight` - another request is already outstanding
    /// - `Error::Serialization` - the request frame cannot be encoded
    /// - `Error::Send` - the write fails; nothing was delivered
    /// - `Error::Decode` - the connection produced a malformed frame
    /// - `Error::ConnectionClosed` - the connection ended before a match
    /// - `Error::Timeout` - the configured bounded wait expired
    pub async fn execute(&self, command: &str) -> Result<String> {
        // ---
        self.execute_inner(command, self.inner.config.request_timeout)
            .await
    }

    /// Execute a shell command with an explicit bounded wait.
    ///
    /// Overrides any configured timeout for this call only.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute); the expired wait surfaces as
    /// `Error::Timeout`.
    pub async fn execute_with_timeout(&self, command: &str, timeout: Duration) -> Result<String> {
        // ---
        self.execute_inner(command, Some(timeout)).await
    }

    async fn execute_inner(&self, command: &str, timeout: Option<Duration>) -> Result<String> {
        // ---
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let msg_id = MessageId::generate();
        let session = SessionId::generate();

        log_debug!("execute: msg_id={msg_id} session={session}");

        let rx = {
            let mut pending = lock_ignore_poison(&self.inner.pending);
            pending.register(msg_id.clone(), session.clone())?
        };

        let request = ExecuteRequest::shell(&msg_id, &session, &self.inner.config.username, command);
        let raw = match request.encode() {
            Ok(raw) => raw,
            Err(err) => {
                lock_ignore_poison(&self.inner.pending).abandon();
                return Err(err);
            }
        };

        if let Err(err) = self.inner.transport.send(raw).await {
            // The request never left; fail the call with no partial result.
            lock_ignore_poison(&self.inner.pending).abandon();
            return Err(err);
        }

        let outcome: std::result::Result<Outcome, _> = match timeout {
            Some(duration) => match time::timeout(duration, rx).await {
                Ok(received) => received,
                Err(_) => {
                    // Clear the slot so a late reply is discarded and the
                    // connection stays usable.
                    lock_ignore_poison(&self.inner.pending).abandon();
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };

        match outcome {
            Ok(outcome) => outcome,
            // Sender dropped without a verdict: the receive loop is gone.
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Close the underlying connection.
    ///
    /// Any outstanding wait fails with `Error::ConnectionClosed` once the
    /// receive loop observes the close.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the close handshake fails.
    pub async fn close(&self) -> Result<()> {
        // ---
        self.inner.transport.close().await
    }
}

/// Connection receive loop.
///
/// Drains inbound frames as fast as they arrive, independent of the
/// submitting caller, so unrelated frames never block the connection.
/// Exits when the connection closes, a frame fails to decode, or every
/// client clone is dropped; on the first two it fails the outstanding
/// request so the waiting caller never hangs.
async fn listen(
    mut frames: FrameInbox,
    pending: Weak<Mutex<Outstanding>>,
    closed: Arc<AtomicBool>,
) {
    // ---
    loop {
        match frames.inbox.recv().await {
            Some(raw) => {
                let Some(pending) = pending.upgrade() else {
                    break;
                };

                match Frame::decode(&raw) {
                    Ok(frame) => dispatch(&pending, frame),
                    Err(err) => {
                        // Malformed input is terminal for this listener.
                        log_warn!("inbound frame failed to decode: {err}");
                        closed.store(true, Ordering::Release);
                        lock_ignore_poison(&pending).fail(err);
                        return;
                    }
                }
            }
            None => {
                // Transport closed or connection lost.
                log_debug!("connection closed");
                closed.store(true, Ordering::Release);
                if let Some(pending) = pending.upgrade() {
                    lock_ignore_poison(&pending).fail(Error::ConnectionClosed);
                }
                return;
            }
        }
    }
}

/// Route one decoded frame to the outstanding request, or discard it.
///
/// Discarding is silent and unbuffered: only one request is ever
/// outstanding per connection, so frames that are not its first matching
/// `stream` frame have no consumer.
fn dispatch(pending: &Mutex<Outstanding>, frame: Frame) {
    // ---
    if frame.msg_type != STREAM {
        log_debug!("ignoring {} frame", frame.msg_type);
        return;
    }

    let delivered = lock_ignore_poison(pending).complete(
        &frame.parent_header.msg_id,
        &frame.parent_header.session,
        frame.content.text,
    );

    if !delivered {
        log_debug!(
            "discarding stream frame for foreign request (msg_id={})",
            frame.parent_header.msg_id
        );
    }
}
