//! Test chat client.
//!
//! Opens a chat stream over WebSocket and sends and asserts on protocol
//! frames.

use chatrelay_proto::{
    ChatMessage, ClientFrame, ErrorCode, FrameReader, FrameWriter, Handshake, MessagePayload,
    ServerFrame, split,
};
use chrono::Utc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, connect_async};

type Stream = MaybeTlsStream<TcpStream>;

/// A test chat client.
pub struct TestClient {
    reader: FrameReader<Stream>,
    writer: FrameWriter<Stream>,
    username: String,
    sent: u32,
}

impl TestClient {
    /// Open a chat stream at `url`.
    pub async fn connect(url: &str, username: &str) -> anyhow::Result<Self> {
        Self::connect_with_origin(url, username, None).await
    }

    /// Open a chat stream, optionally sending an Origin header.
    pub async fn connect_with_origin(
        url: &str,
        username: &str,
        origin: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut request = url.into_client_request()?;
        if let Some(origin) = origin {
            request
                .headers_mut()
                .insert("Origin", HeaderValue::from_str(origin)?);
        }
        let (stream, _response) = connect_async(request).await?;
        let (reader, writer) = split(stream);
        Ok(Self {
            reader,
            writer,
            username: username.to_string(),
            sent: 0,
        })
    }

    /// Send any serializable frame.
    pub async fn send_json<F: serde::Serialize>(&mut self, frame: &F) -> anyhow::Result<()> {
        self.writer.send(frame).await?;
        Ok(())
    }

    /// Send the handshake for `session_id`.
    pub async fn handshake(&mut self, session_id: &str) -> anyhow::Result<()> {
        let frame = ClientFrame::Handshake(Handshake {
            session_id: session_id.to_string(),
            username: self.username.clone(),
            color: "#3366ff".to_string(),
        });
        self.send_json(&frame).await
    }

    /// Send a chat message.
    pub async fn say(&mut self, text: &str) -> anyhow::Result<()> {
        self.sent += 1;
        let frame = ClientFrame::Message(MessagePayload {
            id: format!("{}-{}", self.username, self.sent),
            session_id: None,
            username: self.username.clone(),
            text: text.to_string(),
            color: "#3366ff".to_string(),
            timestamp: Utc::now(),
        });
        self.send_json(&frame).await
    }

    /// Receive the next frame (5 second timeout).
    pub async fn recv(&mut self) -> anyhow::Result<ServerFrame> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive the next frame with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<ServerFrame> {
        match timeout(dur, self.reader.next_server_frame()).await? {
            Some(frame) => Ok(frame?),
            None => anyhow::bail!("stream closed"),
        }
    }

    /// Expect a welcome frame; returns the session id it names.
    pub async fn expect_welcome(&mut self) -> anyhow::Result<String> {
        match self.recv().await? {
            ServerFrame::Welcome { session_id, .. } => Ok(session_id),
            other => anyhow::bail!("expected welcome, got {other:?}"),
        }
    }

    /// Expect a relayed chat message.
    pub async fn expect_message(&mut self) -> anyhow::Result<ChatMessage> {
        match self.recv().await? {
            ServerFrame::Message(message) => Ok(message),
            other => anyhow::bail!("expected message, got {other:?}"),
        }
    }

    /// Expect an error frame.
    pub async fn expect_error(&mut self) -> anyhow::Result<(ErrorCode, String)> {
        match self.recv().await? {
            ServerFrame::Error { code, reason } => Ok((code, reason)),
            other => anyhow::bail!("expected error, got {other:?}"),
        }
    }

    /// Expect the server to end the stream with no further frames.
    pub async fn expect_closed(&mut self) -> anyhow::Result<()> {
        match timeout(Duration::from_secs(5), self.reader.next_server_frame()).await? {
            None => Ok(()),
            Some(Err(_)) => Ok(()),
            Some(Ok(frame)) => anyhow::bail!("expected close, got {frame:?}"),
        }
    }

    /// Assert nothing arrives within `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match timeout(dur, self.reader.next_server_frame()).await {
            Err(_) => Ok(()),
            Ok(other) => anyhow::bail!("expected silence, got {other:?}"),
        }
    }

    /// Close the stream from the client side.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.writer.close("bye").await?;
        Ok(())
    }
}
