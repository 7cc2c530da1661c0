//! Connection handles as seen by the registry and relay.

use super::uid::ConnectionId;
use chatrelay_proto::ChatMessage;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Why a connection was closed from the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A relay send failed or timed out.
    Evicted,
    /// The session was deactivated.
    SessionClosed,
    /// The server is shutting down.
    Shutdown,
    /// The connection's own loop finished.
    Finished,
}

/// A single delivery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// Writer side is gone.
    Closed,
    /// Queue stayed full for the whole send timeout.
    TimedOut,
}

/// Cheap, cloneable handle to one live connection.
///
/// Delivery goes through a bounded outbound queue that the connection's
/// writer task drains. Equality and hashing use the [`ConnectionId`] only.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Arc<ChatMessage>>,
    cancel: CancellationToken,
    close_reason: Arc<OnceLock<CloseReason>>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end of its outbound queue.
    ///
    /// The handle's cancellation token is a child of `parent`, so cancelling
    /// `parent` closes every connection created from it.
    pub fn new(
        id: ConnectionId,
        queue_depth: usize,
        parent: &CancellationToken,
    ) -> (Self, mpsc::Receiver<Arc<ChatMessage>>) {
        let (outbound, rx) = mpsc::channel(queue_depth.max(1));
        let handle = Self {
            id,
            outbound,
            cancel: parent.child_token(),
            close_reason: Arc::new(OnceLock::new()),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue one message, waiting at most `timeout` for room.
    pub async fn send(
        &self,
        message: Arc<ChatMessage>,
        timeout: Duration,
    ) -> Result<(), SendFailure> {
        if self.cancel.is_cancelled() {
            return Err(SendFailure::Closed);
        }
        self.outbound
            .send_timeout(message, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => SendFailure::TimedOut,
                SendTimeoutError::Closed(_) => SendFailure::Closed,
            })
    }

    /// Close the connection. Only the first reason sticks.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.close_reason.set(reason);
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Why the connection was closed, if it was closed through this handle.
    ///
    /// A connection cancelled through its parent token reports `Shutdown`.
    pub fn close_reason(&self) -> Option<CloseReason> {
        match self.close_reason.get() {
            Some(reason) => Some(*reason),
            None if self.cancel.is_cancelled() => Some(CloseReason::Shutdown),
            None => None,
        }
    }

    /// Resolves once the connection is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl Hash for ConnectionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
