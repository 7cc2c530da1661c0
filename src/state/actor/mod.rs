//! Actor Model for Session Membership.
//!
//! This module implements the `SessionActor`, which owns the member set of a
//! single chat session in an isolated Tokio task.
//!
//! # Architecture
//!
//! - **State Ownership**: The actor owns the member set. Nothing else touches it.
//! - **Message Passing**: Register, unregister, snapshot and close all arrive
//!   as `SessionEvent`s and are applied one at a time.
//! - **Lifetime**: An actor is born with its first member. When the set goes
//!   empty it switches to draining, removes its own table entry, and refuses
//!   further registrations so callers retry against a fresh actor.

use crate::state::connection::{CloseReason, ConnectionHandle};
use crate::state::uid::ConnectionId;
use chatrelay_proto::SessionId;
use std::collections::HashMap;
use std::sync::Weak;
use tokio::sync::mpsc;
use tracing::{Instrument, debug};

mod types;

pub use types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActorState {
    Active,
    Draining,
}

/// The Session Actor.
///
/// Owns the member set of one session and processes events sequentially.
pub struct SessionActor {
    session: SessionId,
    generation: u64,
    members: HashMap<ConnectionId, ConnectionHandle>,
    table: Weak<SessionTable>,
    state: ActorState,
}

impl SessionActor {
    /// Create a Session Actor holding `first` and spawn it.
    pub fn spawn(
        session: SessionId,
        generation: u64,
        table: Weak<SessionTable>,
        first: ConnectionHandle,
        capacity: usize,
    ) -> mpsc::Sender<SessionEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let mut members = HashMap::new();
        members.insert(first.id(), first);

        let span = crate::telemetry::spans::session(session.as_str());
        let actor = Self {
            session,
            generation,
            members,
            table,
            state: ActorState::Active,
        };

        tokio::spawn(actor.run(rx).instrument(span));

        tx
    }

    /// The main actor loop. Ends once every mailbox sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
        debug!(generation = self.generation, "session actor stopped");
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Register { conn, reply_tx } => {
                let _ = reply_tx.send(self.handle_register(conn));
            }
            SessionEvent::Unregister { conn, reply_tx } => {
                let removed = self.members.remove(&conn).is_some();
                if removed {
                    debug!(%conn, remaining = self.members.len(), "member left");
                }
                self.cleanup_if_empty();
                let _ = reply_tx.send(removed);
            }
            SessionEvent::Members { reply_tx } => {
                let _ = reply_tx.send(self.members.values().cloned().collect());
            }
            SessionEvent::Close { reason, reply_tx } => {
                let closed = self.members.len();
                for (_, conn) in self.members.drain() {
                    conn.close(reason);
                }
                debug!(closed, ?reason, "session closed");
                self.cleanup_if_empty();
                let _ = reply_tx.send(closed);
            }
        }
    }

    fn handle_register(&mut self, conn: ConnectionHandle) -> Result<usize, SessionDraining> {
        if self.state == ActorState::Draining {
            return Err(SessionDraining);
        }
        let id = conn.id();
        self.members.entry(id).or_insert(conn);
        debug!(conn = %id, members = self.members.len(), "member joined");
        Ok(self.members.len())
    }

    fn cleanup_if_empty(&mut self) {
        if self.state == ActorState::Draining || !self.members.is_empty() {
            return;
        }
        self.state = ActorState::Draining;

        if let Some(table) = self.table.upgrade() {
            let generation = self.generation;
            if table
                .remove_if(&self.session, |_, slot| slot.generation == generation)
                .is_some()
            {
                crate::metrics::session_drained();
            }
        }
        debug!("session empty, actor draining");
    }
}
