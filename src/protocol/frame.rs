// src/protocol/frame.rs

//! Wire frame types and codec.
//!
//! Field names in this module are a compatibility contract with the kernel
//! backend. The backend silently drops requests whose shape it does not
//! recognize, so nothing here may be renamed or restructured without
//! breaking against the real service.
//!
//! Outbound: [`ExecuteRequest`] is the `execute_request` shell-channel
//! frame. Inbound: [`Frame`] decodes any channel message, tolerating fields
//! this crate does not interpret.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, MessageId, Result, SessionId};

/// Kernel messaging protocol version stamped into request headers.
pub const PROTOCOL_VERSION: &str = "5.2";

/// Channel that carries execute requests.
pub const SHELL_CHANNEL: &str = "shell";

/// Frame kind of an outbound execution request.
pub const EXECUTE_REQUEST: &str = "execute_request";

/// Frame kind of streamed command output.
pub const STREAM: &str = "stream";

/// Frame header, used both outbound (fully populated) and inbound
/// (as `header` and `parent_header`, with whatever fields the kernel sent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(default)]
    pub msg_id: String,
    #[serde(default)]
    pub msg_type: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub version: String,
}

/// Body of an `execute_request` frame.
///
/// The flags mirror what an interactive console sends: output is echoed,
/// history recorded, stdin allowed, and execution halts on error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteContent {
    /// Code to execute, already carrying the `!` shell prefix.
    pub code: String,
    pub silent: bool,
    pub store_history: bool,
    pub user_expressions: HashMap<String, String>,
    pub allow_stdin: bool,
    pub stop_on_error: bool,
}

/// Outbound `execute_request` frame for the shell channel.
///
/// `msg_type` appears both in the header and at the top level, and
/// `parent_header` is the empty object; the backend expects exactly this
/// shape.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteRequest {
    pub header: MessageHeader,
    pub msg_type: String,
    pub metadata: HashMap<String, String>,
    pub content: ExecuteContent,
    /// Always serialized as JSON `null`.
    pub buffers: Option<Vec<HashMap<String, Value>>>,
    pub parent_header: HashMap<String, String>,
    pub channel: String,
}

impl ExecuteRequest {
    /// Build a shell-channel execution request for one command.
    ///
    /// The command text is prefixed with `!` per the backend's convention
    /// for user-level shell commands.
    pub fn shell(
        msg_id: &MessageId,
        session: &SessionId,
        username: &str,
        command: &str,
    ) -> Self {
        // ---
        Self {
            header: MessageHeader {
                msg_id: msg_id.to_string(),
                msg_type: EXECUTE_REQUEST.to_string(),
                username: username.to_string(),
                session: session.to_string(),
                version: PROTOCOL_VERSION.to_string(),
            },
            msg_type: EXECUTE_REQUEST.to_string(),
            metadata: HashMap::new(),
            content: ExecuteContent {
                code: format!("!{command}"),
                silent: false,
                store_history: true,
                user_expressions: HashMap::new(),
                allow_stdin: true,
                stop_on_error: true,
            },
            buffers: None,
            parent_header: HashMap::new(),
            channel: SHELL_CHANNEL.to_string(),
        }
    }

    /// Serialize into wire bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if JSON encoding fails.
    pub fn encode(&self) -> Result<Bytes> {
        // ---
        let raw = serde_json::to_vec(self)?;
        Ok(Bytes::from(raw))
    }
}

/// Payload of an inbound frame.
///
/// For `stream` frames, `name` is the stream name (`stdout`/`stderr`) and
/// `text` carries the command output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameContent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub execution_count: i32,
}

/// One inbound frame, as decoded from the connection.
///
/// The kernel multiplexes many frame kinds over the same connection
/// (status, execute_input, stream, ...). Decoding keeps only the fields
/// this crate interprets and ignores everything else, so unknown frame
/// kinds still decode cleanly. `metadata` is carried opaquely and never
/// interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub header: MessageHeader,
    #[serde(default)]
    pub msg_id: String,
    #[serde(default)]
    pub msg_type: String,
    #[serde(default)]
    pub parent_header: MessageHeader,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub content: FrameContent,
    #[serde(default)]
    pub buffers: Option<Vec<HashMap<String, Value>>>,
    #[serde(default)]
    pub channel: String,
}

impl Frame {
    /// Decode one frame from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` on malformed input. The correlation engine
    /// treats that as terminal for the connection's listening loop.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        // ---
        serde_json::from_slice(raw).map_err(Error::Decode)
    }
}
