/// Protocol types for kernel frame correlation and serialization
///
/// This module defines the wire format for request and reply frames
/// and the identifier types used to correlate them.
mod correlation;
mod frame;

pub use correlation::{MessageId, SessionId};
pub use frame::{
    //
    ExecuteContent,
    ExecuteRequest,
    Frame,
    FrameContent,
    MessageHeader,
    EXECUTE_REQUEST,
    PROTOCOL_VERSION,
    SHELL_CHANNEL,
    STREAM,
};
