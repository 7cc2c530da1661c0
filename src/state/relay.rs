//! Session-scoped message fan-out.

use super::connection::{CloseReason, ConnectionHandle, SendFailure};
use super::registry::ConnectionRegistry;
use crate::error::RelayError;
use crate::telemetry::PublishTimer;
use chatrelay_proto::{ChatMessage, SessionId};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one `publish`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Delivers each message to every current member of its session.
///
/// The member set is snapshotted first, sends happen outside the registry
/// and in parallel, and members whose send failed are removed afterwards.
/// The sender is a member like any other and receives its own message.
pub struct BroadcastRelay {
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
}

impl BroadcastRelay {
    pub fn new(registry: Arc<ConnectionRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    /// Fan `message` out to its session.
    ///
    /// Only a structurally invalid session id is an error. Unknown or empty
    /// sessions deliver to nobody.
    pub async fn publish(&self, message: ChatMessage) -> Result<FanoutReport, RelayError> {
        let session =
            SessionId::parse(&message.session_id).map_err(RelayError::InvalidSession)?;
        let _timer = PublishTimer::start();

        let members = self.registry.members_of(&session).await;
        if members.is_empty() {
            debug!(session_id = %session, msg_id = %message.id, "no members to deliver to");
            return Ok(FanoutReport::default());
        }

        let message = Arc::new(message);
        let timeout = self.send_timeout;
        let results = join_all(members.iter().map(|member| {
            let message = Arc::clone(&message);
            async move { member.send(message, timeout).await }
        }))
        .await;

        let mut report = FanoutReport::default();
        for (member, result) in members.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    report.evicted += 1;
                    self.evict(&session, member, failure).await;
                }
            }
        }

        crate::metrics::record_fanout(report.delivered, report.evicted);
        debug!(
            session_id = %session,
            msg_id = %message.id,
            delivered = report.delivered,
            evicted = report.evicted,
            "message relayed"
        );
        Ok(report)
    }

    async fn evict(&self, session: &SessionId, member: &ConnectionHandle, failure: SendFailure) {
        warn!(session_id = %session, conn = %member.id(), ?failure, "evicting member after failed send");
        self.registry.unregister(session, member.id()).await;
        member.close(CloseReason::Evicted);
    }
}
