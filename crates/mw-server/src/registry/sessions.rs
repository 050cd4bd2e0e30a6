//! Session registry: maps live sessions to their connection's outbound sink

use std::collections::HashMap;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::{mpsc, RwLock};

use mw_protocol::{Frame, SessionId, SESSION_ID_LEN};

use crate::error::ServerError;

/// Maximum number of re-draws on session ID collision.
///
/// A real collision in a 256-bit space is treated as unreachable; the cap
/// only exists so a broken random source cannot spin forever.
const MAX_GENERATE_RETRIES: usize = 1024;

/// Registry mapping each live session to the outbound sink of the
/// connection that owns it.
///
/// The registry holds routing references only: the connection lifecycle
/// owns the sink and the socket. An entry appears when a handshake
/// completes and disappears on teardown, so an absent lookup means the
/// target connection is gone and the frame should be dropped.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, mpsc::Sender<Frame>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Generate a fresh session ID and register the sink under it.
    ///
    /// The collision check and the insert happen under a single write
    /// lock, so two concurrent handshakes can never race into the same
    /// ID. Fails with [`ServerError::EntropyExhausted`] if the random
    /// source errors or the retry cap is exhausted.
    pub async fn generate_and_register(
        &self,
        sink: mpsc::Sender<Frame>,
    ) -> Result<SessionId, ServerError> {
        let mut sessions = self.sessions.write().await;

        let mut id = None;
        for _ in 0..MAX_GENERATE_RETRIES {
            let candidate = draw_session_id()?;
            if !sessions.contains_key(&candidate) {
                id = Some(candidate);
                break;
            }
        }

        match id {
            Some(id) => {
                sessions.insert(id, sink);
                Ok(id)
            }
            None => Err(ServerError::EntropyExhausted),
        }
    }

    /// Insert a sink under an explicit session ID.
    ///
    /// Does nothing if the session is already registered; generation makes
    /// that unreachable on the handshake path.
    pub async fn register(&self, session: SessionId, sink: mpsc::Sender<Frame>) {
        self.sessions.write().await.entry(session).or_insert(sink);
    }

    /// Look up the outbound sink for a session.
    ///
    /// `None` is not an error: the target connection no longer exists
    /// (it raced with teardown) and the caller drops the frame.
    pub async fn lookup(&self, session: SessionId) -> Option<mpsc::Sender<Frame>> {
        self.sessions.read().await.get(&session).cloned()
    }

    /// Remove a session. Idempotent.
    pub async fn unregister(&self, session: SessionId) {
        self.sessions.write().await.remove(&session);
    }

    /// Whether a session is currently registered
    pub async fn contains(&self, session: SessionId) -> bool {
        self.sessions.read().await.contains_key(&session)
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Check if the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw a 256-bit session ID from the operating system's secure source
fn draw_session_id() -> Result<SessionId, ServerError> {
    let mut bytes = [0u8; SESSION_ID_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| ServerError::EntropyExhausted)?;
    Ok(SessionId::new(bytes))
}
