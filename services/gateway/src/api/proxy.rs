//! Session proxy surface: `/instance/{operation}[/{sessionName}]`.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use swarm_node_api::RelayedResponse;

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::gateway::ProxyCall;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/instance/{*route}", any(proxy))
}

async fn proxy(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(route): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let call = ProxyCall {
        method,
        route,
        path_and_query,
        headers,
        body,
    };

    let relayed = state
        .gateway()
        .handle(call)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(ctx.request_id))?;

    Ok(relay(relayed))
}

fn relay(relayed: RelayedResponse) -> Response {
    let mut response = (relayed.status, Body::from(relayed.body)).into_response();
    // Body bytes are untouched, so the node's encoding headers travel with them.
    *response.headers_mut() = relayed.headers;
    response
}
