//! Network listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// HTTP API listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    pub address: SocketAddr,
}

/// WebSocket chat stream listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Address to bind to for WebSocket (e.g., "0.0.0.0:8081").
    pub address: SocketAddr,
    /// Allowed origins for CORS (e.g., `["https://example.com"]`).
    /// Empty list allows all origins.
    #[serde(default)]
    pub allow_origins: Vec<String>,
    /// Reject upgrades that carry no Origin header.
    #[serde(default)]
    pub require_origin: bool,
    /// Largest accepted inbound text frame, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl WebSocketConfig {
    /// Upgrade-time settings for the protocol crate's handshake validator.
    pub fn handshake_config(&self) -> chatrelay_proto::WebSocketConfig {
        chatrelay_proto::WebSocketConfig {
            allowed_origins: self.allow_origins.clone(),
            require_origin: self.require_origin,
            ..chatrelay_proto::WebSocketConfig::default()
        }
    }
}

fn default_max_message_bytes() -> usize {
    chatrelay_proto::MAX_FRAME_LEN
}
