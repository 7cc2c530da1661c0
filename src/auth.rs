//! Session credential validation.
//!
//! The relay core never looks inside session records. It only needs a
//! definitive answer to "may this connection join session X", which the
//! [`SessionAuthenticator`] collaborator provides. The SQLite store in
//! [`crate::db`] is the production implementation.

use async_trait::async_trait;
use chatrelay_proto::{Credentials, ErrorCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Canonical session record returned by a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Upper-cased session id.
    pub id: String,
    /// Display name of whoever opened the session.
    pub host_name: String,
    /// Token for the public invitation link.
    pub public_link_id: String,
    /// Whether the session still accepts participants.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Why credentials were refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("session not found")]
    NotFound,

    #[error("session is no longer active")]
    Inactive,

    #[error("invalid password")]
    WrongPassword,

    /// The backing store could not answer.
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        self.wire_code().as_str()
    }

    /// Code carried in the `error` frame sent before closing.
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            Self::NotFound => ErrorCode::SessionNotFound,
            Self::Inactive => ErrorCode::SessionInactive,
            Self::WrongPassword => ErrorCode::InvalidCredential,
            Self::Unavailable(_) => ErrorCode::Internal,
        }
    }
}

/// External collaborator that validates session credentials.
#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    /// Check a session id and password pair.
    async fn validate_credentials(
        &self,
        session_id: &str,
        password: &str,
    ) -> Result<SessionRecord, AuthError>;

    /// Resolve a public invitation token.
    async fn resolve_public_link(&self, link_token: &str) -> Result<SessionRecord, AuthError>;
}

/// Run the lookup matching the credential form a client presented.
pub async fn authenticate(
    authenticator: &dyn SessionAuthenticator,
    credentials: &Credentials,
) -> Result<SessionRecord, AuthError> {
    let result = match credentials {
        Credentials::Password {
            session_id,
            password,
        } => {
            authenticator
                .validate_credentials(&session_id.trim().to_uppercase(), password)
                .await
        }
        Credentials::Link { token } => authenticator.resolve_public_link(token).await,
    };

    if let Err(ref e) = result {
        crate::metrics::record_auth_failure(e.error_code());
    }
    result
}
