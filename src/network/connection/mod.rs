//! Connection - Handles an individual chat stream.
//!
//! Each Connection runs in its own Tokio task:
//!
//! ```text
//! Phase 1: Authenticate (credentials from the upgrade URI)
//!    ↓   welcome frame
//! Phase 2: Session loop
//!    ┌─────────────────────────────────────────────────────┐
//!    │  ┌──────────────┐                ┌──────────────┐   │
//!    │  │ FrameReader  │                │ writer task  │   │
//!    │  └──────┬───────┘                └──────▲───────┘   │
//!    │         ▼                               │           │
//!    │  SessionConnectionHandler ──▶ relay ──▶ outbound    │
//!    │                                         queues      │
//!    └─────────────────────────────────────────────────────┘
//!    ↓
//! Phase 3: Final error frame (if any), close frame
//! ```

mod guard;
mod handler;
mod writer;

pub use handler::{FrameSource, HandlerState, SessionConnectionHandler};

use crate::auth::{self, SessionAuthenticator};
use crate::error::{HandlerError, HandlerResult};
use crate::state::{CloseReason, ConnectionHandle, ConnectionId, Hub};
use chatrelay_proto::{Credentials, ErrorCode, FrameWriter, ServerFrame, SessionId, split};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};
use writer::spawn_writer;

/// A client connection after the WebSocket upgrade.
pub struct Connection<S> {
    id: ConnectionId,
    stream: WebSocketStream<S>,
    addr: SocketAddr,
    credentials: Option<Credentials>,
    hub: Arc<Hub>,
    authenticator: Arc<dyn SessionAuthenticator>,
    max_frame_len: usize,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        id: ConnectionId,
        stream: WebSocketStream<S>,
        addr: SocketAddr,
        credentials: Option<Credentials>,
        hub: Arc<Hub>,
        authenticator: Arc<dyn SessionAuthenticator>,
        max_frame_len: usize,
    ) -> Self {
        Self {
            id,
            stream,
            addr,
            credentials,
            hub,
            authenticator,
            max_frame_len,
        }
    }

    /// Run the connection to completion.
    ///
    /// Errors have already been reported to the client when they can be;
    /// the returned error is for logging.
    pub async fn run(self) -> HandlerResult {
        crate::metrics::client_connected();
        let result = self.serve().await;
        crate::metrics::client_disconnected();

        if let Err(HandlerError::Protocol(ref e)) = result {
            crate::metrics::record_protocol_error(e.code().as_str());
        }
        result
    }

    async fn serve(self) -> HandlerResult {
        let (mut reader, mut writer) = split(self.stream);
        reader.set_max_frame_len(self.max_frame_len);

        // Phase 1: authenticate before touching the core.
        let record = match self.credentials.as_ref() {
            None => Err(HandlerError::MissingCredentials),
            Some(credentials) => auth::authenticate(self.authenticator.as_ref(), credentials)
                .await
                .map_err(HandlerError::from),
        };
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                info!(addr = %self.addr, error = %e, "connection rejected");
                finish(&mut writer, Some(&e)).await;
                return Err(e);
            }
        };
        let authorized = SessionId::parse(&record.id)?;

        writer
            .send(&ServerFrame::Welcome {
                session_id: authorized.to_string(),
                host_name: record.host_name.clone(),
            })
            .await?;

        // Phase 2: handler on this task, writer on its own.
        let (handle, outbound) = ConnectionHandle::new(
            self.id,
            self.hub.config.outbound_queue,
            &self.hub.shutdown,
        );
        let write_task = spawn_writer(writer, outbound, handle.clone(), self.hub.config.send_timeout());

        let mut handler =
            SessionConnectionHandler::new(Arc::clone(&self.hub), handle.clone(), authorized);
        let result = handler.run(&mut reader).await;

        let reason = handle.close_reason();
        handle.close(CloseReason::Finished);

        // Phase 3: take the socket back for the final frame.
        let mut writer = match write_task.await {
            Ok(writer) => writer,
            Err(e) => {
                warn!(conn = %handle.id(), error = %e, "writer task failed");
                return result;
            }
        };

        match (&result, reason) {
            (Err(e), _) => finish(&mut writer, Some(e)).await,
            (Ok(()), Some(CloseReason::SessionClosed)) => {
                let frame = ServerFrame::Error {
                    code: ErrorCode::SessionClosed,
                    reason: "session was deactivated".to_string(),
                };
                if let Err(e) = writer.send(&frame).await {
                    debug!(error = %e, "could not send session-closed frame");
                }
                finish(&mut writer, None).await;
            }
            (Ok(()), _) => finish(&mut writer, None).await,
        }

        result
    }
}

/// Send the error frame for `error` (if it has one), then a close frame.
async fn finish<S>(writer: &mut FrameWriter<S>, error: Option<&HandlerError>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(frame) = error.and_then(HandlerError::to_error_frame)
        && let Err(e) = writer.send(&frame).await
    {
        debug!(error = %e, "could not send error frame");
    }
    if let Err(e) = writer.close("").await {
        debug!(error = %e, "close failed");
    }
}
