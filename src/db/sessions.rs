//! Session repository.
//!
//! Handles session creation, lookup by id or public link, deactivation,
//! and credential checks for the relay.

use super::{Database, DbError};
use crate::auth::{AuthError, SessionAuthenticator, SessionRecord};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::OnceLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Attempts at finding an unused 8-character id before giving up.
const MAX_ID_ATTEMPTS: usize = 5;

type SessionRow = (String, String, String, String, bool, i64);

/// Repository for session operations.
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a new active session.
    ///
    /// The id is the first 8 hex digits of a v4 UUID, upper-cased; the
    /// public link is a full v4 UUID. A clashing id is retried.
    pub async fn create(&self, host_name: &str, password: &str) -> Result<SessionRecord, DbError> {
        let password_hash = hash_password(password)?;
        let created_at = Utc::now();

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = new_session_id();
            let public_link_id = Uuid::new_v4().to_string();

            let result = sqlx::query(
                r#"
                INSERT INTO chat_sessions (id, host_name, password_hash, public_link_id, is_active, created_at)
                VALUES (?, ?, ?, ?, 1, ?)
                "#,
            )
            .bind(&id)
            .bind(host_name)
            .bind(&password_hash)
            .bind(&public_link_id)
            .bind(created_at.timestamp())
            .execute(self.pool)
            .await;

            match result {
                Ok(_) => {
                    info!(session_id = %id, host = %host_name, "Session created");
                    return Ok(SessionRecord {
                        id,
                        host_name: host_name.to_string(),
                        public_link_id,
                        is_active: true,
                        created_at: truncate_to_seconds(created_at),
                    });
                }
                Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                    debug!(session_id = %id, "Session id collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DbError::IdExhausted)
    }

    /// Find a session and its password hash by id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<(SessionRecord, String)>, DbError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, host_name, password_hash, public_link_id, is_active, created_at
            FROM chat_sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(into_record))
    }

    /// Find a session by its public link token.
    pub async fn find_by_link(&self, link_id: &str) -> Result<Option<SessionRecord>, DbError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, host_name, password_hash, public_link_id, is_active, created_at
            FROM chat_sessions
            WHERE public_link_id = ?
            "#,
        )
        .bind(link_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| into_record(r).0))
    }

    /// Mark a session inactive. Returns whether it was active before.
    pub async fn deactivate(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE chat_sessions
            SET is_active = 0, deactivated_at = ?
            WHERE id = ? AND is_active = 1
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(self.pool)
        .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            info!(session_id = %id, "Session deactivated");
        }
        Ok(changed)
    }

    /// Check an id and password against the stored session.
    pub async fn verify(&self, id: &str, password: &str) -> Result<SessionRecord, AuthError> {
        let Some((record, hash)) = self.find_by_id(id).await.map_err(unavailable)? else {
            dummy_password_verify(password);
            return Err(AuthError::NotFound);
        };
        if !record.is_active {
            return Err(AuthError::Inactive);
        }
        if !verify_password(password, &hash) {
            return Err(AuthError::WrongPassword);
        }
        Ok(record)
    }
}

#[async_trait]
impl SessionAuthenticator for Database {
    async fn validate_credentials(
        &self,
        session_id: &str,
        password: &str,
    ) -> Result<SessionRecord, AuthError> {
        self.sessions().verify(session_id, password).await
    }

    async fn resolve_public_link(&self, link_token: &str) -> Result<SessionRecord, AuthError> {
        let record = self
            .sessions()
            .find_by_link(link_token)
            .await
            .map_err(unavailable)?
            .ok_or(AuthError::NotFound)?;
        if !record.is_active {
            return Err(AuthError::Inactive);
        }
        Ok(record)
    }
}

fn unavailable(err: DbError) -> AuthError {
    AuthError::Unavailable(err.to_string())
}

fn into_record(row: SessionRow) -> (SessionRecord, String) {
    let (id, host_name, password_hash, public_link_id, is_active, created_at) = row;
    let record = SessionRecord {
        id,
        host_name,
        public_link_id,
        is_active,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
    };
    (record, password_hash)
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> Result<String, DbError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Spend about as long as a real verification when the session is unknown,
/// so response time does not reveal which ids exist.
fn dummy_password_verify(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    let hash = DUMMY_HASH.get_or_init(|| hash_password("chatrelay-dummy").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}
