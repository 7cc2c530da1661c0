//! Unified error handling for chatrelay.
//!
//! This module provides the error hierarchy for the relay core, with
//! automatic conversions, `error` frame generation, and metric labeling.

use crate::auth::AuthError;
use chatrelay_proto::{ErrorCode, ProtocolError, ServerFrame, TransportReadError};
use thiserror::Error;

// ============================================================================
// Handler Errors (per-connection control loop)
// ============================================================================

/// Errors that end a connection's control loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("no credentials in upgrade request")]
    MissingCredentials,

    #[error("no handshake within {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TransportReadError> for HandlerError {
    fn from(err: TransportReadError) -> Self {
        match err {
            TransportReadError::Protocol(e) => Self::Protocol(e),
            TransportReadError::WebSocket(e) => Self::Transport(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::Relay(e) => e.error_code(),
            _ => self.wire_code().map_or("internal", |c| c.as_str()),
        }
    }

    fn wire_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Protocol(e) => Some(e.code()),
            Self::Auth(e) => Some(e.wire_code()),
            Self::MissingCredentials => Some(ErrorCode::MissingCredentials),
            Self::HandshakeTimeout(_) => Some(ErrorCode::HandshakeTimeout),
            Self::Relay(_) | Self::Internal(_) => Some(ErrorCode::Internal),
            Self::Transport(_) => None,
        }
    }

    /// Convert to the `error` frame sent before closing.
    ///
    /// Returns `None` when the transport itself failed and nothing can be sent.
    pub fn to_error_frame(&self) -> Option<ServerFrame> {
        let code = self.wire_code()?;
        let reason = match self {
            // Internal details stay in the log.
            Self::Relay(_) | Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        Some(ServerFrame::Error { code, reason })
    }
}

/// Result type for connection handlers.
pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// Relay Errors (fan-out)
// ============================================================================

/// Fan-out errors. Member send failures never surface here; they evict.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("message has no routable session: {0}")]
    InvalidSession(#[source] ProtocolError),
}

impl RelayError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSession(_) => "invalid_session",
        }
    }
}

// ============================================================================
// Database Errors (re-exported, kept in db module for sqlx proximity)
// ============================================================================

// DbError stays in db/mod.rs because it has #[from] sqlx::Error which requires
// sqlx to be in scope.
