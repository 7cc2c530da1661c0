//! Outbound writer task.
//!
//! Drains a connection's outbound queue into the WebSocket. One per
//! connection; the read side never writes relayed messages itself.

use crate::state::{CloseReason, ConnectionHandle};
use chatrelay_proto::{ChatMessage, FrameWriter, ServerFrame};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug};

/// Spawn the writer. The task hands the [`FrameWriter`] back when it ends
/// so the caller can send a final frame and close the socket.
///
/// A write that fails or takes longer than `write_timeout` closes the
/// connection through `handle`.
pub(super) fn spawn_writer<S>(
    mut writer: FrameWriter<S>,
    mut outbound: mpsc::Receiver<Arc<ChatMessage>>,
    handle: ConnectionHandle,
    write_timeout: Duration,
) -> JoinHandle<FrameWriter<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(
        async move {
            loop {
                let message = tokio::select! {
                    biased;
                    _ = handle.closed() => break,
                    message = outbound.recv() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };

                let frame = ServerFrame::Message(ChatMessage::clone(&message));
                match tokio::time::timeout(write_timeout, writer.send(&frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(error = %e, "write failed");
                        handle.close(CloseReason::Finished);
                        break;
                    }
                    Err(_) => {
                        debug!(?write_timeout, "write timed out");
                        handle.close(CloseReason::Evicted);
                        break;
                    }
                }
            }
            writer
        }
        .in_current_span(),
    )
}
