//! Telemetry utilities for publish timing and span construction.

use std::time::Instant;

/// Guard for timing one fan-out and recording its latency.
///
/// Records when dropped, so early returns are timed too.
pub struct PublishTimer {
    start: Instant,
}

impl PublishTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Drop for PublishTimer {
    fn drop(&mut self) {
        crate::metrics::record_publish_latency(self.start.elapsed().as_secs_f64());
    }
}

/// Standardized span constructors.
pub mod spans {
    use std::net::SocketAddr;
    use tracing::{Span, info_span};

    /// Span for one client connection, from accept to close.
    pub fn connection(conn: &str, addr: &SocketAddr) -> Span {
        info_span!("connection", conn = %conn, addr = %addr, session_id = tracing::field::Empty)
    }

    /// Span for one session actor task.
    pub fn session(session_id: &str) -> Span {
        info_span!("session", session_id = %session_id)
    }
}
