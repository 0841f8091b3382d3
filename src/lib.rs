//! Request/response correlation over Jupyter-style kernel channels
//!
//! This library opens a persistent WebSocket connection to an
//! interactive-compute kernel, submits shell commands as `execute_request`
//! frames, and correlates the streamed output back to the submitting
//! caller using `(msg_id, session)` identifier pairs. It handles
//! identifier generation, wire framing, background frame draining, and the
//! kernelspec-listing operation built on top of the same correlation path.
//!

// Import all sub modules once...
mod client;
mod domain;
mod listing;
mod protocol;
mod transport;

mod config;

mod error;
mod macros;

// Re-export main types
pub use client::KernelClient;

pub use config::KernelConfig;

pub use error::{Error, Result};

pub use listing::{parse_listing, KernelSpec, LIST_KERNELSPECS};

pub use protocol::{
    //
    ExecuteContent,
    ExecuteRequest,
    Frame,
    FrameContent,
    MessageHeader,
    MessageId,
    SessionId,
    EXECUTE_REQUEST,
    PROTOCOL_VERSION,
    SHELL_CHANNEL,
    STREAM,
};

pub use transport::{create_memory_transport, MemoryRemote};

#[cfg(feature = "transport_websocket")]
pub use transport::create_websocket_transport;

// --- public re-exports
pub use domain::{
    //
    FrameInbox,
    Transport,
    TransportPtr,
};

#[allow(unused_imports)]
pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

/// Create the crate-default transport for `config`.
///
/// With the `transport_websocket` feature (the default) this dials the
/// kernel's channel endpoint. Without any transport feature there is
/// nothing to connect with, and this returns `Error::Connect`; tests use
/// [`create_memory_transport`] directly instead.
pub async fn create_transport(config: &KernelConfig) -> Result<TransportPtr> {
    // ---
    #[cfg(feature = "transport_websocket")]
    {
        return transport::create_websocket_transport(config).await;
    }

    #[cfg(not(feature = "transport_websocket"))]
    {
        let _ = config;
        Err(Error::Connect(
            "no transport feature enabled; build with `transport_websocket`".to_string(),
        ))
    }
}
