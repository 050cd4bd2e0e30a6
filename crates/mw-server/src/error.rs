//! Server error types

use mw_protocol::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the server.
///
/// Per-connection failures (transport errors, protocol violations) are
/// terminal for the affected connection only; they are handled at the
/// connection boundary and never reach callers of the server API.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The secure random source failed while generating a session ID
    #[error("Session ID generation exhausted the random source")]
    EntropyExhausted,
}
