use thiserror::Error;

/// Errors that can occur while talking to a kernel.
#[derive(Error, Debug)]
pub enum Error {
    /// Connecting to the kernel endpoint failed.
    #[error("failed to connect to kernel endpoint: {0}")]
    Connect(String),

    /// Writing a request frame to the connection failed.
    ///
    /// The request was not delivered; the engine reports this immediately
    /// without waiting for a reply.
    #[error("failed to send request frame: {0}")]
    Send(String),

    /// Transport-level failure outside of connect/send (subscription to the
    /// inbound half, close, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection closed before a matching reply frame arrived.
    #[error("connection closed before a matching reply arrived")]
    ConnectionClosed,

    /// An inbound frame could not be decoded.
    ///
    /// Malformed input is terminal for the connection's listener; the
    /// outstanding request fails with this error.
    #[error("malformed inbound frame: {0}")]
    Decode(#[source] serde_json::Error),

    /// Serializing an outbound request failed.
    #[error("request serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller opted into a bounded wait and it expired.
    #[error("request timed out waiting for a reply")]
    Timeout,

    /// A request is already outstanding on this connection.
    ///
    /// The engine correlates exactly one request at a time; callers must
    /// wait for the outstanding one to resolve or fail first.
    #[error("a request is already in flight on this connection")]
    RequestInFlight,

    /// The configured kernel endpoint could not be turned into a URL.
    #[error("invalid kernel endpoint: {0}")]
    InvalidUrl(String),
}

/// Result type alias for kernel operations
pub type Result<T> = std::result::Result<T, Error>;
