//! Server configuration

use serde::{Deserialize, Serialize};

/// Configuration for the muxwire server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the TCP listener to
    pub bind_address: String,

    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:4000".to_string(),
            max_connections: 10_000,
        }
    }
}
