//! Per-connection control loop.
//!
//! ```text
//! Handshaking ──handshake──▶ Registered ──eof / error / close──▶ Draining ──▶ Closed
//!      │                                                                      ▲
//!      └──────────── timeout / bad frame / eof / close ───────────────────────┘
//! ```
//!
//! Membership is taken on entering `Registered` and given back on leaving
//! it, on every path. An aborted task gives it back through the
//! registration guard.

use super::guard::RegistrationGuard;
use crate::error::{HandlerError, HandlerResult};
use crate::state::{CloseReason, ConnectionHandle, Hub};
use async_trait::async_trait;
use chatrelay_proto::{
    ClientFrame, FrameReader, MessagePayload, ProtocolError, SenderIdentity, SessionId,
    TransportReadError,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{Span, debug, info, trace};

/// Where a handler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Handshaking,
    Registered,
    Draining,
    Closed,
}

/// Source of decoded client frames.
///
/// `None` means the peer ended the stream.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Option<Result<ClientFrame, TransportReadError>>;
}

#[async_trait]
impl<S> FrameSource for FrameReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_frame(&mut self) -> Option<Result<ClientFrame, TransportReadError>> {
        self.next_client_frame().await
    }
}

/// Binds one connection to its session and pumps its messages into the relay.
pub struct SessionConnectionHandler {
    hub: Arc<Hub>,
    handle: ConnectionHandle,
    /// Session the credentials were accepted for at connect time.
    authorized: SessionId,
    state: HandlerState,
}

impl SessionConnectionHandler {
    pub fn new(hub: Arc<Hub>, handle: ConnectionHandle, authorized: SessionId) -> Self {
        Self {
            hub,
            handle,
            authorized,
            state: HandlerState::Handshaking,
        }
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Run until the stream ends, a frame is rejected, or the connection
    /// is closed from outside. Always ends in [`HandlerState::Closed`].
    ///
    /// A handler runs once; later calls are refused without touching the
    /// registry.
    pub async fn run<F>(&mut self, frames: &mut F) -> HandlerResult
    where
        F: FrameSource + ?Sized,
    {
        if self.state != HandlerState::Handshaking {
            return Err(HandlerError::Internal(format!(
                "handler already ran (state {:?})",
                self.state
            )));
        }
        let result = self.drive(frames).await;
        self.state = HandlerState::Closed;
        result
    }

    async fn drive<F>(&mut self, frames: &mut F) -> HandlerResult
    where
        F: FrameSource + ?Sized,
    {
        let Some((session, sender)) = self.handshake(frames).await? else {
            debug!("stream ended before handshake");
            return Ok(());
        };

        Span::current().record("session_id", session.as_str());
        let (guard, members) = RegistrationGuard::register(
            Arc::clone(&self.hub.registry),
            session.clone(),
            self.handle.clone(),
        )
        .await;
        self.state = HandlerState::Registered;
        info!(username = %sender.username, members, "joined session");

        // Deactivated between connect-time auth and registration.
        if self.hub.is_retired(&session) {
            debug!("session deactivated during join");
            self.handle.close(CloseReason::SessionClosed);
        }

        let result = self.pump(frames, &session, &sender).await;

        self.state = HandlerState::Draining;
        guard.release().await;
        info!(username = %sender.username, "left session");
        result
    }

    /// Wait for the handshake frame. `Ok(None)` if the stream ended or the
    /// connection was closed first.
    async fn handshake<F>(
        &self,
        frames: &mut F,
    ) -> Result<Option<(SessionId, SenderIdentity)>, HandlerError>
    where
        F: FrameSource + ?Sized,
    {
        let timeout = self.hub.config.handshake_timeout();
        let frame = tokio::select! {
            biased;
            _ = self.handle.closed() => return Ok(None),
            read = tokio::time::timeout(timeout, frames.next_frame()) => match read {
                Ok(frame) => frame,
                Err(_) => return Err(HandlerError::HandshakeTimeout(timeout)),
            },
        };

        match frame {
            None => Ok(None),
            Some(Err(e)) => Err(e.into()),
            Some(Ok(ClientFrame::Handshake(handshake))) => {
                let (session, sender) = handshake.into_parts()?;
                if session != self.authorized {
                    return Err(ProtocolError::SessionMismatch {
                        expected: self.authorized.to_string(),
                        actual: session.to_string(),
                    }
                    .into());
                }
                Ok(Some((session, sender)))
            }
            Some(Ok(other)) => Err(ProtocolError::UnexpectedFrame(other.kind()).into()),
        }
    }

    async fn pump<F>(&self, frames: &mut F, session: &SessionId, sender: &SenderIdentity) -> HandlerResult
    where
        F: FrameSource + ?Sized,
    {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.handle.closed() => {
                    debug!(reason = ?self.handle.close_reason(), "connection closed");
                    return Ok(());
                }
                frame = frames.next_frame() => frame,
            };

            let payload = match frame {
                None => return Ok(()),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(ClientFrame::Message(payload))) => payload,
                Some(Ok(other)) => {
                    return Err(ProtocolError::UnexpectedFrame(other.kind()).into());
                }
            };

            let message = with_sender_defaults(payload, sender).bind(session)?;
            let report = self.hub.relay.publish(message).await?;
            trace!(delivered = report.delivered, evicted = report.evicted, "published");
        }
    }
}

/// Fill a blank username or color from the handshake identity.
fn with_sender_defaults(mut payload: MessagePayload, sender: &SenderIdentity) -> MessagePayload {
    if payload.username.trim().is_empty() {
        payload.username = sender.username.clone();
    }
    if payload.color.trim().is_empty() {
        payload.color = sender.color.clone();
    }
    payload
}
