//! The Hub - shared state for the relay.
//!
//! Holds the registry, the relay, and the settings every connection task
//! needs. One Hub lives for the whole process; nothing in it survives a
//! restart.

use super::{BroadcastRelay, CloseReason, ConnectionIdGenerator, ConnectionRegistry};
use crate::config::RelayConfig;
use chatrelay_proto::SessionId;
use dashmap::DashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Hub {
    /// Session id to live connections.
    pub registry: Arc<ConnectionRegistry>,

    /// Fan-out over `registry`.
    pub relay: BroadcastRelay,

    /// Id generator for new connections.
    pub conn_ids: ConnectionIdGenerator,

    /// Relay timing and queue sizes.
    pub config: RelayConfig,

    /// Parent of every connection's cancellation token.
    pub shutdown: CancellationToken,

    /// Sessions deactivated since startup.
    retired: DashSet<SessionId>,
}

impl Hub {
    pub fn new(config: RelayConfig, shutdown: CancellationToken) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = BroadcastRelay::new(Arc::clone(&registry), config.send_timeout());
        Self {
            registry,
            relay,
            conn_ids: ConnectionIdGenerator::new(),
            config,
            shutdown,
            retired: DashSet::new(),
        }
    }

    /// Retire a deactivated session and close every member attached to it.
    ///
    /// The session is marked before members are closed, so a handler that
    /// registers after the close sees the mark and closes itself.
    pub async fn close_session(&self, session: &SessionId) -> usize {
        self.retired.insert(session.clone());
        self.registry
            .close_session(session, CloseReason::SessionClosed)
            .await
    }

    /// Whether `session` was deactivated while this process was running.
    pub fn is_retired(&self, session: &SessionId) -> bool {
        self.retired.contains(session)
    }
}
