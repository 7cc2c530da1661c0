//! Error types for the chatrelay protocol library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Machine-readable reason carried in a server `error` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame was not valid JSON or did not match any known frame shape.
    MalformedFrame,
    /// Frame exceeded the configured size limit.
    FrameTooLong,
    /// Handshake was missing a required field.
    InvalidHandshake,
    /// Handshake or message named a different session than the one authorized.
    SessionMismatch,
    /// A frame arrived that is not valid in the current connection state.
    UnexpectedFrame,
    /// No handshake arrived within the allowed time.
    HandshakeTimeout,
    /// The upgrade request carried no usable credentials.
    MissingCredentials,
    /// No session matches the supplied id or link.
    SessionNotFound,
    /// The session exists but has been deactivated.
    SessionInactive,
    /// The password did not match.
    InvalidCredential,
    /// The session was closed while the connection was attached.
    SessionClosed,
    /// Unexpected server-side failure.
    Internal,
}

impl ErrorCode {
    /// Static label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedFrame => "malformed_frame",
            Self::FrameTooLong => "frame_too_long",
            Self::InvalidHandshake => "invalid_handshake",
            Self::SessionMismatch => "session_mismatch",
            Self::UnexpectedFrame => "unexpected_frame",
            Self::HandshakeTimeout => "handshake_timeout",
            Self::MissingCredentials => "missing_credentials",
            Self::SessionNotFound => "session_not_found",
            Self::SessionInactive => "session_inactive",
            Self::InvalidCredential => "invalid_credential",
            Self::SessionClosed => "session_closed",
            Self::Internal => "internal",
        }
    }
}

/// Protocol-level errors: anything a peer can get wrong on the wire.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Frame could not be parsed as JSON of the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame exceeds the configured maximum length.
    #[error("frame too long: {actual} bytes (limit {limit})")]
    FrameTooLong {
        /// Actual length in bytes.
        actual: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Handshake was structurally valid JSON but semantically incomplete.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(&'static str),

    /// Session identifier was empty after trimming.
    #[error("session id is empty")]
    EmptySessionId,

    /// Frame named a different session than the connection is bound to.
    #[error("session mismatch: bound to {expected}, frame names {actual}")]
    SessionMismatch {
        /// Session the connection is bound to.
        expected: String,
        /// Session named by the offending frame.
        actual: String,
    },

    /// A frame type arrived that is not valid in the current state.
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),

    /// Binary WebSocket frames are not part of the protocol.
    #[error("binary frames are not supported")]
    BinaryFrame,
}

impl ProtocolError {
    /// Wire error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Malformed(_) | Self::BinaryFrame => ErrorCode::MalformedFrame,
            Self::FrameTooLong { .. } => ErrorCode::FrameTooLong,
            Self::InvalidHandshake(_) | Self::EmptySessionId => ErrorCode::InvalidHandshake,
            Self::SessionMismatch { .. } => ErrorCode::SessionMismatch,
            Self::UnexpectedFrame(_) => ErrorCode::UnexpectedFrame,
        }
    }
}
