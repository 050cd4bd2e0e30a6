//! Protocol error types

use thiserror::Error;

/// Errors that can occur during frame encoding/decoding
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Input shorter than the fixed frame header
    #[error("Malformed header: got {actual} bytes, header is {expected} bytes")]
    MalformedHeader { expected: usize, actual: usize },

    /// Payload shorter than the length declared in the header
    #[error("Truncated payload: header declares {declared} bytes, {available} available")]
    TruncatedPayload { declared: u64, available: usize },

    /// Frame exceeds the maximum on-wire size
    #[error("Frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { size: u64, max: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
