//! Tagged JSON frames exchanged over a chat stream.
//!
//! Every WebSocket text frame carries exactly one JSON object with a `type`
//! discriminator. Clients send one `handshake` followed by any number of
//! `message` frames; the server answers with `welcome`, relayed `message`
//! frames, and a final `error` frame when it closes a connection on purpose.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ProtocolError, Result};
use crate::message::{default_color, ChatMessage, MessagePayload, SenderIdentity, SessionId};

/// Handshake naming the session and the sender identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Session to bind to.
    pub session_id: String,
    /// Display name.
    pub username: String,
    /// Display color token.
    #[serde(default = "default_color")]
    pub color: String,
}

impl Handshake {
    /// Normalized session id named by this handshake.
    pub fn session_id(&self) -> Result<SessionId> {
        SessionId::parse(&self.session_id)
    }

    /// Validate required fields and split into session and sender identity.
    pub fn into_parts(self) -> Result<(SessionId, SenderIdentity)> {
        let session = self.session_id()?;
        let username = self.username.trim();
        if username.is_empty() {
            return Err(ProtocolError::InvalidHandshake("username is required"));
        }
        let color = if self.color.trim().is_empty() {
            default_color()
        } else {
            self.color
        };
        Ok((
            session,
            SenderIdentity {
                username: username.to_string(),
                color,
            },
        ))
    }
}

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    /// First frame of every stream.
    Handshake(Handshake),
    /// A chat message to relay.
    Message(MessagePayload),
}

impl ClientFrame {
    /// Decode a client frame, enforcing `max_len` before parsing.
    pub fn decode(text: &str, max_len: usize) -> Result<Self> {
        if text.len() > max_len {
            return Err(ProtocolError::FrameTooLong {
                actual: text.len(),
                limit: max_len,
            });
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Frame name for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::Message(_) => "message",
        }
    }
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Credentials accepted; the connection is bound to this session.
    #[serde(rename_all = "camelCase")]
    Welcome {
        /// Canonical session id.
        session_id: String,
        /// Host name recorded for the session.
        host_name: String,
    },
    /// A relayed chat message.
    Message(ChatMessage),
    /// The server is closing the connection for this reason.
    #[serde(rename_all = "camelCase")]
    Error {
        /// Machine-readable reason.
        code: ErrorCode,
        /// Human-readable detail.
        reason: String,
    },
}

impl ServerFrame {
    /// Build an error frame from a protocol error.
    pub fn from_protocol_error(err: &ProtocolError) -> Self {
        Self::Error {
            code: err.code(),
            reason: err.to_string(),
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a server frame (used by clients and tests).
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
