//! Session identifier type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bytes in a session identifier.
pub const SESSION_ID_LEN: usize = 32;

/// Unique 256-bit identifier for a connection's session.
///
/// Assigned by the server during the handshake and used to route reply
/// frames back to the owning connection. The value is opaque: any bit
/// pattern is valid and it carries no meaning beyond routing identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub [u8; SESSION_ID_LEN]);

impl SessionId {
    /// Create a session ID from raw bytes
    pub fn new(bytes: [u8; SESSION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// All-zero session ID, conventionally sent by clients before the
    /// handshake has assigned a real one.
    pub const ZERO: SessionId = SessionId([0u8; SESSION_ID_LEN]);

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviated to the first four bytes for logs
        write!(
            f,
            "session-{:02x}{:02x}{:02x}{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl From<[u8; SESSION_ID_LEN]> for SessionId {
    fn from(bytes: [u8; SESSION_ID_LEN]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        let mut bytes = [0u8; SESSION_ID_LEN];
        bytes[0] = 0xde;
        bytes[1] = 0xad;
        bytes[2] = 0xbe;
        bytes[3] = 0xef;
        let id = SessionId::new(bytes);
        assert_eq!(format!("{}", id), "session-deadbeef");
    }

    #[test]
    fn test_session_id_equality() {
        let id1 = SessionId::new([7u8; SESSION_ID_LEN]);
        let id2 = SessionId::new([7u8; SESSION_ID_LEN]);
        let id3 = SessionId::new([8u8; SESSION_ID_LEN]);

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_zero_session_id() {
        assert_eq!(SessionId::ZERO.as_bytes(), &[0u8; SESSION_ID_LEN]);
    }
}
