//! HTTP API for session management and Prometheus metrics.
//!
//! Serves the session endpoints the web client calls before it opens a
//! chat stream, plus `/metrics` for scraping.

use crate::auth::{AuthError, SessionAuthenticator};
use crate::db::{Database, DbError};
use crate::state::Hub;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chatrelay_proto::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub hub: Arc<Hub>,
}

/// Errors returned by HTTP handlers, rendered as a JSON body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound,
    Inactive,
    WrongPassword,
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound => Self::NotFound,
            AuthError::Inactive => Self::Inactive,
            AuthError::WrongPassword => Self::WrongPassword,
            AuthError::Unavailable(detail) => Self::Internal(detail),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_argument", msg),
            Self::NotFound => (StatusCode::NOT_FOUND, "not_found", "Session not found"),
            Self::Inactive => (
                StatusCode::PRECONDITION_FAILED,
                "failed_precondition",
                "Session is no longer active",
            ),
            Self::WrongPassword => (StatusCode::FORBIDDEN, "permission_denied", "Invalid password"),
            Self::Internal(detail) => {
                error!(error = %detail, "HTTP request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", "Internal error")
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn require(value: &str, message: &'static str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(message));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub host_name: String,
    pub public_link_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionResponse {
    pub session_id: String,
    pub host_name: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionByLinkResponse {
    pub session_id: String,
    pub host_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeactivateRequest {
    #[serde(default)]
    pub password: String,
}

/// POST /chat/sessions
async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<Json<CreateSessionResponse>> {
    require(&req.host_name, "Host name is required")?;
    require(&req.password, "Password is required")?;

    let record = state
        .db
        .sessions()
        .create(req.host_name.trim(), &req.password)
        .await?;

    Ok(Json(CreateSessionResponse {
        session_id: record.id,
        host_name: record.host_name,
        public_link_id: record.public_link_id,
    }))
}

/// POST /chat/sessions/join
async fn join_session(
    State(state): State<AppState>,
    Json(req): Json<JoinSessionRequest>,
) -> ApiResult<Json<JoinSessionResponse>> {
    require(&req.session_id, "Session ID is required")?;
    require(&req.password, "Password is required")?;
    require(&req.username, "Username is required")?;

    let record = state
        .db
        .validate_credentials(&req.session_id.trim().to_uppercase(), &req.password)
        .await?;

    Ok(Json(JoinSessionResponse {
        session_id: record.id,
        host_name: record.host_name,
        username: req.username,
    }))
}

/// GET /chat/sessions/link/:link_id
async fn session_by_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> ApiResult<Json<SessionByLinkResponse>> {
    require(&link_id, "Link ID is required")?;
    let record = state.db.resolve_public_link(link_id.trim()).await?;

    Ok(Json(SessionByLinkResponse {
        session_id: record.id,
        host_name: record.host_name,
    }))
}

/// POST /chat/sessions/:id/deactivate
///
/// Marks the session inactive and closes every live stream attached to it.
async fn deactivate_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<DeactivateRequest>,
) -> ApiResult<StatusCode> {
    let session =
        SessionId::parse(&session_id).map_err(|_| ApiError::BadRequest("Session ID is required"))?;
    require(&req.password, "Password is required")?;

    state
        .db
        .validate_credentials(session.as_str(), &req.password)
        .await?;
    state.db.sessions().deactivate(session.as_str()).await?;

    let closed = state.hub.close_session(&session).await;
    info!(session_id = %session, closed, "session deactivated over HTTP");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /metrics - Prometheus text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat/sessions", post(create_session))
        .route("/chat/sessions/join", post(join_session))
        .route("/chat/sessions/link/:link_id", get(session_by_link))
        .route("/chat/sessions/:id/deactivate", post(deactivate_session))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(address = %listener.local_addr()?, "HTTP API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
