//! WebSocket upgrade handling for chat streams.
//!
//! This module provides origin validation and subprotocol negotiation for
//! the upgrade request, and extracts the connection-time credentials a
//! client presents in the upgrade URI query string.

use std::fmt;
#[cfg(feature = "tokio")]
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
#[cfg(feature = "tokio")]
use tokio_tungstenite::tungstenite::http::StatusCode;

/// Subprotocol advertised by the server.
pub const SUBPROTOCOL: &str = "chatrelay.v1";

/// Configuration for WebSocket chat connections.
///
/// Controls origin validation, subprotocol negotiation, and CORS headers.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// List of allowed origin URLs (empty allows all).
    pub allowed_origins: Vec<String>,
    /// Whether an Origin header is required.
    pub require_origin: bool,
    /// The subprotocol to advertise.
    pub subprotocol: Option<String>,
    /// Whether to add CORS headers to responses.
    pub enable_cors: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            require_origin: false,
            subprotocol: Some(SUBPROTOCOL.to_string()),
            enable_cors: true,
        }
    }
}

/// Result of WebSocket handshake validation.
#[derive(Debug)]
#[non_exhaustive]
pub enum HandshakeResult {
    /// Handshake accepted with negotiated parameters.
    Accept {
        /// The negotiated subprotocol, if any.
        subprotocol: Option<String>,
        /// The client's origin, if provided.
        origin: Option<String>,
    },
    /// Handshake rejected with error details.
    Reject {
        /// HTTP status code to return.
        status: u16,
        /// Human-readable rejection reason.
        reason: String,
    },
}

impl fmt::Display for HandshakeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeResult::Accept {
                subprotocol,
                origin,
            } => {
                write!(f, "Accept")?;
                if let Some(proto) = subprotocol {
                    write!(f, " (protocol: {})", proto)?;
                }
                if let Some(orig) = origin {
                    write!(f, " (origin: {})", orig)?;
                }
                Ok(())
            }
            HandshakeResult::Reject { status, reason } => {
                write!(f, "Reject {} - {}", status, reason)
            }
        }
    }
}

/// Credentials presented when opening a chat stream.
///
/// Either a session id with its password, or a public invitation link.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Session id and shared password.
    Password {
        /// Session id as typed by the user (not yet normalized).
        session_id: String,
        /// Shared session password.
        password: String,
    },
    /// Public invitation link token.
    Link {
        /// Link token.
        token: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { session_id, .. } => f
                .debug_struct("Password")
                .field("session_id", session_id)
                .field("password", &"<redacted>")
                .finish(),
            Self::Link { token } => f.debug_struct("Link").field("token", token).finish(),
        }
    }
}

impl Credentials {
    /// Extract credentials from an upgrade URI query string.
    ///
    /// Accepts `sessionId` + `password`, or `link`. Blank values count as
    /// absent. A link takes precedence when both forms are present.
    pub fn from_query(query: Option<&str>) -> Option<Self> {
        let query = query?;
        let mut session_id = None;
        let mut password = None;
        let mut link = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "sessionId" | "session_id" => session_id = Some(value),
                "password" => password = Some(value),
                "link" | "linkId" => link = Some(value),
                _ => {}
            }
        }

        if let Some(token) = link {
            return Some(Self::Link { token });
        }
        match (session_id, password) {
            (Some(session_id), Some(password)) => Some(Self::Password {
                session_id,
                password,
            }),
            _ => None,
        }
    }
}

/// Validate a WebSocket upgrade request against the configuration.
///
/// Returns `HandshakeResult::Accept` if the request passes all checks,
/// or `HandshakeResult::Reject` with an appropriate error.
#[cfg(feature = "tokio")]
pub fn validate_handshake(req: &Request, config: &WebSocketConfig) -> HandshakeResult {
    let origin = req
        .headers()
        .get("Origin")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    if config.require_origin && origin.is_none() {
        return HandshakeResult::Reject {
            status: 403,
            reason: "Origin header required".to_string(),
        };
    }

    if !config.allowed_origins.is_empty() {
        if let Some(ref origin_value) = origin {
            if !config
                .allowed_origins
                .iter()
                .any(|allowed| allowed == origin_value || allowed == "*")
            {
                return HandshakeResult::Reject {
                    status: 403,
                    reason: format!("Origin '{}' not allowed", origin_value),
                };
            }
        }
    }

    let selected_protocol = config.subprotocol.as_ref().and_then(|advertised| {
        req.headers()
            .get_all("Sec-WebSocket-Protocol")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .find(|p| p == advertised)
            .map(|_| advertised.clone())
    });

    HandshakeResult::Accept {
        subprotocol: selected_protocol,
        origin,
    }
}

/// Build an HTTP response for a WebSocket handshake result.
///
/// Takes the response tungstenite prepared, adds CORS headers and the
/// negotiated subprotocol, or turns a rejection into an error response.
#[cfg(feature = "tokio")]
#[allow(clippy::result_large_err)]
pub fn build_handshake_response(
    result: &HandshakeResult,
    config: &WebSocketConfig,
    mut response: Response,
) -> Result<Response, ErrorResponse> {
    match result {
        HandshakeResult::Accept {
            subprotocol,
            origin,
        } => {
            let headers = response.headers_mut();
            if config.enable_cors {
                if let Some(value) = origin.as_deref().and_then(|o| o.parse().ok()) {
                    headers.insert("Access-Control-Allow-Origin", value);
                }
            }
            if let Some(value) = subprotocol.as_deref().and_then(|p| p.parse().ok()) {
                headers.insert("Sec-WebSocket-Protocol", value);
            }
            Ok(response)
        }
        HandshakeResult::Reject { status, reason } => {
            let mut error = ErrorResponse::new(Some(reason.clone()));
            *error.status_mut() = StatusCode::from_u16(*status).unwrap_or(StatusCode::FORBIDDEN);
            Err(error)
        }
    }
}
