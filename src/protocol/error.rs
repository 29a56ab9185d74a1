use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process-local protocol failures.
///
/// `InvalidLength` and `FrameTooLarge` are fatal to the connection that
/// produced them; `Decode` is recoverable (the peer sent a well-framed but
/// malformed payload).
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid frame length {0} (allowed 1..={max})", max = super::codec::MAX_FRAME_SIZE)]
    InvalidLength(usize),

    #[error("payload of {0} bytes exceeds frame limit")]
    FrameTooLarge(usize),

    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl ProtocolError {
    /// Fatal errors require the caller to close the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidLength(_) | ProtocolError::FrameTooLarge(_)
        )
    }
}

/// Error descriptor carried inside a `Response` (the wire-visible taxonomy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteFault {
    /// Command requires an authenticated session.
    Unauthorized(String),
    /// No handler registered under this name.
    UnknownCommand(String),
    /// Request was well-formed msgpack but semantically unusable.
    BadRequest(String),
    /// The command handler reported a failure.
    Handler(String),
    /// Server-side failure outside the handler (panic, pool shutdown).
    Internal(String),
}

impl std::fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteFault::Unauthorized(msg) => write!(f, "unauthorized: {}", msg),
            RemoteFault::UnknownCommand(name) => write!(f, "unknown command '{}'", name),
            RemoteFault::BadRequest(msg) => write!(f, "bad request: {}", msg),
            RemoteFault::Handler(msg) => write!(f, "command failed: {}", msg),
            RemoteFault::Internal(msg) => write!(f, "internal server error: {}", msg),
        }
    }
}

impl std::error::Error for RemoteFault {}
