//! Node API endpoints.
//!
//! Operator surface over the node registry. Nodes are never deleted here;
//! retire one by setting `active` to false.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::api::sessions::{ListSessionsResponse, SessionResponse};
use crate::db::StoreError;
use crate::error::GatewayError;
use crate::model::{Node, NodeId, NodeUpdate, SessionFilter};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/nodes", get(list_nodes))
        .route("/nodes/provision", post(provision_node))
        .route("/nodes/{node_id}", get(get_node).patch(update_node))
        .route("/nodes/{node_id}/sessions", get(list_node_sessions))
        .route("/nodes/{node_id}/reset", post(reset_node))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct NodeResponse {
    pub id: NodeId,
    pub name: String,
    pub ip: String,
    pub url: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<Node> for NodeResponse {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            name: node.name,
            ip: node.ip,
            url: node.url,
            active: node.active,
            capacity: node.capacity,
            created_at: node.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListNodesResponse {
    pub items: Vec<NodeResponse>,
}

#[derive(Debug, Serialize)]
pub struct ResetNodeResponse {
    pub node_id: NodeId,
    pub sessions_removed: u64,
}

pub(crate) fn store_error(e: StoreError, request_id: &str) -> ApiError {
    ApiError::from(GatewayError::from(e)).with_request_id(request_id)
}

pub(crate) fn parse_id(raw: &str, what: &str, request_id: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| {
        ApiError::bad_request(format!("invalid_{what}_id"), format!("Invalid {what} ID format"))
            .with_request_id(request_id)
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /nodes
async fn list_nodes(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let nodes = state
        .nodes()
        .list()
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    Ok(Json(ListNodesResponse {
        items: nodes.into_iter().map(NodeResponse::from).collect(),
    }))
}

/// GET /nodes/{node_id}
async fn get_node(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let node_id = NodeId(parse_id(&node_id, "node", &ctx.request_id)?);

    let node = state
        .nodes()
        .get(node_id)
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    Ok(Json(NodeResponse::from(node)))
}

/// PATCH /nodes/{node_id}
async fn update_node(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(node_id): Path<String>,
    Json(update): Json<NodeUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let node_id = NodeId(parse_id(&node_id, "node", &ctx.request_id)?);

    if update.capacity.is_some_and(|c| c < 0) {
        return Err(
            ApiError::bad_request("invalid_capacity", "Capacity cannot be negative")
                .with_request_id(ctx.request_id),
        );
    }

    let node = state
        .nodes()
        .update(node_id, update)
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    info!(node_id = %node.id, active = node.active, "Node updated");
    Ok(Json(NodeResponse::from(node)))
}

/// GET /nodes/{node_id}/sessions
async fn list_node_sessions(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let node_id = NodeId(parse_id(&node_id, "node", &ctx.request_id)?);

    // 404 for unknown nodes rather than an empty list.
    state
        .nodes()
        .get(node_id)
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    let sessions = state
        .sessions()
        .list(SessionFilter::ByNode(node_id))
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    Ok(Json(ListSessionsResponse {
        items: sessions.into_iter().map(SessionResponse::from).collect(),
    }))
}

/// POST /nodes/{node_id}/reset
///
/// Drops every session bound to the node. The node itself is untouched.
async fn reset_node(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let node_id = NodeId(parse_id(&node_id, "node", &ctx.request_id)?);

    state
        .nodes()
        .get(node_id)
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    let sessions_removed = state
        .sessions()
        .delete_for_node(node_id)
        .await
        .map_err(|e| store_error(e, &ctx.request_id))?;

    info!(
        node_id = %node_id,
        sessions_removed,
        request_id = %ctx.request_id,
        "Node sessions reset"
    );

    Ok(Json(ResetNodeResponse {
        node_id,
        sessions_removed,
    }))
}

/// POST /nodes/provision
///
/// Runs one provisioning attempt inline and returns the registered node.
async fn provision_node(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    info!(request_id = %ctx.request_id, "Operator requested provisioning");

    let node = state
        .provisioner()
        .provision_node()
        .await
        .map_err(|e| ApiError::from(GatewayError::from(e)).with_request_id(&ctx.request_id))?;

    Ok((StatusCode::CREATED, Json(NodeResponse::from(node))))
}
