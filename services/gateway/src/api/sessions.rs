//! Session API endpoints.
//!
//! Read and correct the session directory. Session creation and teardown go
//! through the proxy surface, never through here.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::nodes::{parse_id, store_error};
use crate::api::request_context::RequestContext;
use crate::model::{NodeId, Session, SessionFilter, SessionId, SessionKey, SessionStatus, SessionUpdate};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}", get(get_session).patch(update_session))
}

/// A session as shown to operators. The client token is not echoed.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: SessionId,
    pub name: String,
    pub status: SessionStatus,
    pub node_id: NodeId,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            name: session.name,
            status: session.status,
            node_id: session.node_id,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub items: Vec<SessionResponse>,
}

/// GET /sessions
async fn list_sessions(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state
        .sessions()
        .list(SessionFilter::All)
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    Ok(Json(ListSessionsResponse {
        items: sessions.into_iter().map(SessionResponse::from).collect(),
    }))
}

/// GET /sessions/{session_id}
async fn get_session(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = SessionId(parse_id(&session_id, "session", &ctx.request_id)?);

    let session = state
        .sessions()
        .find(SessionKey::ById(session_id))
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    Ok(Json(SessionResponse::from(session)))
}

/// PATCH /sessions/{session_id}
async fn update_session(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(session_id): Path<String>,
    Json(update): Json<SessionUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = SessionId(parse_id(&session_id, "session", &ctx.request_id)?);

    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(
            ApiError::bad_request("invalid_name", "Session name cannot be empty")
                .with_request_id(ctx.request_id),
        );
    }

    let session = state
        .sessions()
        .update(SessionKey::ById(session_id), update)
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    info!(session_id = %session.id, status = %session.status, "Session updated");
    Ok(Json(SessionResponse::from(session)))
}
