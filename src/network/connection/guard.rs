//! Drop guard that keeps registry membership tied to the handler's lifetime.

use crate::state::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use chatrelay_proto::SessionId;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Registry membership for one connection.
///
/// Call [`release`](Self::release) on orderly exit. If the guard is dropped
/// while still armed (the owning task was aborted or panicked), it spawns
/// the unregister on the current runtime instead.
pub(super) struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    session: SessionId,
    conn: ConnectionId,
    armed: bool,
}

impl RegistrationGuard {
    /// Register `handle` under `session` and arm the guard.
    pub(super) async fn register(
        registry: Arc<ConnectionRegistry>,
        session: SessionId,
        handle: ConnectionHandle,
    ) -> (Self, usize) {
        let conn = handle.id();
        // Armed before the await so an abort mid-register still cleans up.
        let guard = Self {
            registry,
            session,
            conn,
            armed: true,
        };
        let members = guard.registry.register(&guard.session, handle).await;
        (guard, members)
    }

    /// Unregister now. Returns whether the connection was still a member.
    pub(super) async fn release(mut self) -> bool {
        let removed = self.registry.unregister(&self.session, self.conn).await;
        self.armed = false;
        removed
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let registry = Arc::clone(&self.registry);
        let session = self.session.clone();
        let conn = self.conn;
        match Handle::try_current() {
            Ok(runtime) => {
                debug!(session_id = %session, %conn, "unregistering from drop guard");
                runtime.spawn(async move {
                    registry.unregister(&session, conn).await;
                });
            }
            Err(_) => {
                warn!(session_id = %session, %conn, "no runtime to unregister on drop");
            }
        }
    }
}
