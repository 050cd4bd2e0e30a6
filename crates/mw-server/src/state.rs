//! Shared server state

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::registry::{HandlerRegistry, SessionRegistry};

/// State shared by the listener, the dispatch router and every
/// connection.
///
/// The registries are owned here and handed to collaborators as explicit
/// `Arc` references.
pub struct ServerState {
    /// Configuration
    pub config: ServerConfig,
    /// Live sessions and their outbound sinks
    pub sessions: Arc<SessionRegistry>,
    /// Handlers keyed by action code
    pub handlers: Arc<HandlerRegistry>,
}

impl ServerState {
    /// Create fresh state for a server
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(SessionRegistry::new()),
            handlers: Arc::new(HandlerRegistry::new()),
        }
    }
}
