use crate::state::connection::{CloseReason, ConnectionHandle};
use crate::state::uid::ConnectionId;
use chatrelay_proto::SessionId;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Session id to live actor mailbox.
pub type SessionTable = DashMap<SessionId, SessionSlot>;

/// One entry in the [`SessionTable`].
///
/// `generation` tells a draining actor whether the entry it is about to
/// remove is still its own or already belongs to a successor.
#[derive(Debug, Clone)]
pub struct SessionSlot {
    pub generation: u64,
    pub tx: mpsc::Sender<SessionEvent>,
}

/// The actor has gone empty and no longer accepts members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session actor is draining")]
pub struct SessionDraining;

/// Events that can be sent to a Session Actor.
#[derive(Debug)]
pub enum SessionEvent {
    /// Attach a connection. Replies with the member count afterwards.
    Register {
        conn: ConnectionHandle,
        reply_tx: oneshot::Sender<Result<usize, SessionDraining>>,
    },
    /// Detach a connection. Replies whether it was a member.
    Unregister {
        conn: ConnectionId,
        reply_tx: oneshot::Sender<bool>,
    },
    /// Snapshot of current members.
    Members {
        reply_tx: oneshot::Sender<Vec<ConnectionHandle>>,
    },
    /// Close and detach every member. Replies with how many were closed.
    Close {
        reason: CloseReason,
        reply_tx: oneshot::Sender<usize>,
    },
}
