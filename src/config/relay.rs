//! Fan-out and per-connection timing configuration.

use serde::Deserialize;
use std::time::Duration;

/// Relay tuning.
///
/// ```toml
/// [relay]
/// send_timeout_ms = 2000
/// outbound_queue = 64
/// handshake_timeout_ms = 10000
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Upper bound on delivering one message to one member (default: 2000).
    /// A member that cannot accept a message in time is evicted.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Outbound queue depth per connection (default: 64).
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Time allowed between upgrade and handshake frame (default: 10000).
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            outbound_queue: default_outbound_queue(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl RelayConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

fn default_send_timeout_ms() -> u64 {
    2000
}

fn default_outbound_queue() -> usize {
    64
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}
