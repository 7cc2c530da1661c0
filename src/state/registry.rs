//! Session-scoped connection registry.
//!
//! A thin front for the per-session actors: it finds (or creates) the
//! actor for a session and forwards the request. No operation here holds a
//! lock across an await, and no operation waits on a connection's send.

use super::actor::{SessionActor, SessionEvent, SessionSlot, SessionTable};
use super::connection::{CloseReason, ConnectionHandle};
use super::uid::ConnectionId;
use chatrelay_proto::SessionId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

const DEFAULT_MAILBOX: usize = 256;

/// Tracks which live connections belong to which session.
///
/// A session id is present exactly while it has at least one member.
pub struct ConnectionRegistry {
    table: Arc<SessionTable>,
    next_generation: AtomicU64,
    mailbox_capacity: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_mailbox_capacity(DEFAULT_MAILBOX)
    }

    pub fn with_mailbox_capacity(mailbox_capacity: usize) -> Self {
        Self {
            table: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
            mailbox_capacity,
        }
    }

    /// Add `conn` to the session, creating the session entry if absent.
    ///
    /// Registering the same connection twice is a no-op. Returns the member
    /// count after the call.
    pub async fn register(&self, session: &SessionId, conn: ConnectionHandle) -> usize {
        loop {
            let tx = match self.table.entry(session.clone()) {
                Entry::Occupied(slot) => slot.get().tx.clone(),
                Entry::Vacant(vacant) => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let tx = SessionActor::spawn(
                        session.clone(),
                        generation,
                        Arc::downgrade(&self.table),
                        conn.clone(),
                        self.mailbox_capacity,
                    );
                    vacant.insert(SessionSlot { generation, tx });
                    crate::metrics::session_opened();
                    debug!(session_id = %session, conn = %conn.id(), "session opened");
                    return 1;
                }
            };

            let (reply_tx, reply_rx) = oneshot::channel();
            let event = SessionEvent::Register {
                conn: conn.clone(),
                reply_tx,
            };
            if tx.send(event).await.is_err() {
                self.remove_stale(session, &tx);
                continue;
            }
            match reply_rx.await {
                Ok(Ok(count)) => return count,
                // Draining: the actor already dropped its entry, retry fresh.
                Ok(Err(_)) => continue,
                Err(_) => {
                    self.remove_stale(session, &tx);
                    continue;
                }
            }
        }
    }

    /// Remove `conn` from the session. Idempotent; unknown ids are ignored.
    ///
    /// Returns whether the connection was a member.
    pub async fn unregister(&self, session: &SessionId, conn: ConnectionId) -> bool {
        let Some(tx) = self.mailbox(session) else {
            return false;
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if tx
            .send(SessionEvent::Unregister { conn, reply_tx })
            .await
            .is_err()
        {
            self.remove_stale(session, &tx);
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Snapshot of the current members. Empty for unknown sessions.
    pub async fn members_of(&self, session: &SessionId) -> Vec<ConnectionHandle> {
        let Some(tx) = self.mailbox(session) else {
            return Vec::new();
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if tx.send(SessionEvent::Members { reply_tx }).await.is_err() {
            self.remove_stale(session, &tx);
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Close every member of the session. Returns how many were closed.
    pub async fn close_session(&self, session: &SessionId, reason: CloseReason) -> usize {
        let Some(tx) = self.mailbox(session) else {
            return 0;
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if tx
            .send(SessionEvent::Close { reason, reply_tx })
            .await
            .is_err()
        {
            self.remove_stale(session, &tx);
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    pub fn contains(&self, session: &SessionId) -> bool {
        self.table.contains_key(session)
    }

    /// Number of sessions with at least one member.
    pub fn session_count(&self) -> usize {
        self.table.len()
    }

    fn mailbox(&self, session: &SessionId) -> Option<mpsc::Sender<SessionEvent>> {
        self.table.get(session).map(|slot| slot.tx.clone())
    }

    /// Drop an entry whose actor task is gone without draining.
    fn remove_stale(&self, session: &SessionId, tx: &mpsc::Sender<SessionEvent>) {
        if self
            .table
            .remove_if(session, |_, slot| slot.tx.same_channel(tx))
            .is_some()
        {
            warn!(session_id = %session, "removed stale session entry");
            crate::metrics::session_drained();
        }
    }
}
