//! Chat message and session identifier types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Display color used when a client does not pick one.
pub const DEFAULT_COLOR: &str = "#00ff00";

/// A session identifier, upper-cased at construction.
///
/// Session ids are opaque to the relay; the only structural rule is that
/// they are non-empty once surrounding whitespace is removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Normalize and validate a raw session id.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::EmptySessionId);
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// The normalized id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Who is speaking: display name and color token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    /// Display name.
    pub username: String,
    /// Display color token (e.g. `#ff00ff`).
    pub color: String,
}

/// A chat message as relayed to session members.
///
/// Immutable once built. The relay routes on `session_id` and forwards
/// every other field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Client-chosen unique token.
    pub id: String,
    /// Session the message belongs to.
    pub session_id: String,
    /// Display name of the sender.
    pub username: String,
    /// Message body.
    #[serde(alias = "message")]
    pub text: String,
    /// Display color token.
    pub color: String,
    /// Client timestamp.
    pub timestamp: DateTime<Utc>,
}

/// A message as received from a client, before it is bound to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Client-chosen unique token.
    pub id: String,
    /// Optional session id; must match the connection's session when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Display name of the sender.
    pub username: String,
    /// Message body.
    #[serde(alias = "message")]
    pub text: String,
    /// Display color token.
    #[serde(default = "default_color")]
    pub color: String,
    /// Client timestamp; the server clock is used when absent.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl MessagePayload {
    /// Attach the connection's session, confirming any id the client sent.
    pub fn bind(self, session: &SessionId) -> Result<ChatMessage, ProtocolError> {
        if let Some(claimed) = self.session_id.as_deref() {
            let claimed = SessionId::parse(claimed)?;
            if &claimed != session {
                return Err(ProtocolError::SessionMismatch {
                    expected: session.to_string(),
                    actual: claimed.to_string(),
                });
            }
        }

        Ok(ChatMessage {
            id: self.id,
            session_id: session.to_string(),
            username: self.username,
            text: self.text,
            color: self.color,
            timestamp: self.timestamp,
        })
    }
}

pub(crate) fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}
