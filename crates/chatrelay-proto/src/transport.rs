//! Split WebSocket transport for JSON frames.
//!
//! [`split`] turns a WebSocket stream into a [`FrameReader`] and a
//! [`FrameWriter`] so reading and writing can live in separate tasks.
//! Control frames are skipped on read; binary frames are a protocol error.

use std::borrow::Cow;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;
use tracing::trace;

use crate::error::ProtocolError;
use crate::frame::{ClientFrame, ServerFrame};
use crate::MAX_FRAME_LEN;

/// Errors that can occur when reading from a transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportReadError {
    /// The WebSocket layer failed.
    #[error("transport WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// A protocol error occurred.
    #[error("transport protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Split a WebSocket stream into frame reader and writer halves.
pub fn split<S>(stream: WebSocketStream<S>) -> (FrameReader<S>, FrameWriter<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = stream.split();
    (
        FrameReader {
            stream,
            max_frame_len: MAX_FRAME_LEN,
        },
        FrameWriter { sink },
    )
}

/// Read half: yields decoded frames.
pub struct FrameReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
    max_frame_len: usize,
}

impl<S> FrameReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Set the maximum accepted text frame length in bytes.
    pub fn set_max_frame_len(&mut self, len: usize) {
        self.max_frame_len = len;
    }

    /// Next text payload. `None` once the peer closed the stream.
    pub async fn next_text(&mut self) -> Option<Result<String, TransportReadError>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => {
                    if text.len() > self.max_frame_len {
                        return Some(Err(ProtocolError::FrameTooLong {
                            actual: text.len(),
                            limit: self.max_frame_len,
                        }
                        .into()));
                    }
                    return Some(Ok(text));
                }
                Ok(WsMessage::Close(frame)) => {
                    trace!(?frame, "peer sent close frame");
                    return None;
                }
                Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => continue,
                Ok(WsMessage::Binary(_)) => {
                    return Some(Err(ProtocolError::BinaryFrame.into()));
                }
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(read_error(e))),
            }
        }
    }

    /// Next frame sent by a client.
    pub async fn next_client_frame(&mut self) -> Option<Result<ClientFrame, TransportReadError>> {
        let max = self.max_frame_len;
        Some(
            self.next_text()
                .await?
                .and_then(|text| Ok(ClientFrame::decode(&text, max)?)),
        )
    }

    /// Next frame sent by the server.
    pub async fn next_server_frame(&mut self) -> Option<Result<ServerFrame, TransportReadError>> {
        Some(
            self.next_text()
                .await?
                .and_then(|text| Ok(ServerFrame::decode(&text)?)),
        )
    }
}

/// Classify a WebSocket read failure.
///
/// A message over the stream's size limit is the peer's fault and gets an
/// `error` frame like any other oversized frame.
fn read_error(err: WsError) -> TransportReadError {
    match err {
        WsError::Capacity(CapacityError::MessageTooLong { size, max_size }) => {
            ProtocolError::FrameTooLong {
                actual: size,
                limit: max_size,
            }
            .into()
        }
        other => other.into(),
    }
}

/// Write half: encodes and sends frames.
pub struct FrameWriter<S> {
    sink: SplitSink<WebSocketStream<S>, WsMessage>,
}

impl<S> FrameWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Serialize `frame` as JSON and send it as one text frame.
    pub async fn send<F: Serialize>(&mut self, frame: &F) -> Result<(), TransportReadError> {
        let text = serde_json::to_string(frame).map_err(ProtocolError::from)?;
        self.sink.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    /// Send a close frame and flush.
    ///
    /// A peer that already went away is not an error here.
    pub async fn close(&mut self, reason: &str) -> Result<(), TransportReadError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Owned(reason.to_string()),
        };
        match self.sink.send(WsMessage::Close(Some(frame))).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
            Err(e) => return Err(e.into()),
        }
        match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_conversion() {
        let err: TransportReadError = ProtocolError::BinaryFrame.into();
        assert!(err.to_string().contains("transport protocol error"));
        assert!(err.to_string().contains("binary frames"));
    }

    #[test]
    fn test_oversized_message_is_a_protocol_error() {
        let err = read_error(WsError::Capacity(CapacityError::MessageTooLong {
            size: 70_000,
            max_size: 16_384,
        }));
        match err {
            TransportReadError::Protocol(ProtocolError::FrameTooLong { actual, limit }) => {
                assert_eq!(actual, 70_000);
                assert_eq!(limit, 16_384);
            }
            other => panic!("expected FrameTooLong, got {other:?}"),
        }

        let err = read_error(WsError::Capacity(CapacityError::TooManyHeaders));
        assert!(matches!(err, TransportReadError::WebSocket(_)));
    }

    #[test]
    fn test_websocket_error_conversion() {
        let err: TransportReadError = WsError::ConnectionClosed.into();
        assert!(matches!(err, TransportReadError::WebSocket(_)));
    }
}
