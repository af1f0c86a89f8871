use axum::{
    http::{
        header::{CONTENT_TYPE, RETRY_AFTER},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use swarm_node_api::NodeApiError;
use tracing::error;

use crate::error::GatewayError;

/// Seconds a client should wait before retrying a saturated create.
const CAPACITY_RETRY_AFTER_SECONDS: u32 = 30;

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub code: String,
    pub request_id: String,
    pub retryable: bool,
    pub retry_after_seconds: u32,
}

impl ProblemDetails {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let title = status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string();
        Self {
            r#type: format!("https://swarm.dev/problems/{code}"),
            title,
            status: status.as_u16(),
            detail: detail.into(),
            instance: None,
            code,
            request_id: "unknown".to_string(),
            retryable: false,
            retry_after_seconds: 0,
        }
    }

    fn set_request_id(&mut self, request_id: impl Into<String>) {
        let request_id = request_id.into();
        self.request_id = request_id.clone();
        if self.instance.is_none() {
            self.instance = Some(request_id);
        }
    }

    fn set_retry_after_seconds(&mut self, seconds: u32) {
        self.retry_after_seconds = seconds;
        if seconds > 0 {
            self.retryable = true;
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
}

impl ApiError {
    fn with_status(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, code, message)
    }

    pub fn method_not_allowed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::METHOD_NOT_ALLOWED, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_GATEWAY, code, message)
    }

    pub fn service_unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, code, message)
    }

    pub fn gateway_timeout(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::GATEWAY_TIMEOUT, code, message)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.problem.set_request_id(request_id);
        self
    }

    pub fn with_retry_after_seconds(mut self, seconds: u32) -> Self {
        self.problem.set_retry_after_seconds(seconds);
        self
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Validation(message) => Self::bad_request("invalid_request", message),
            GatewayError::SessionExists(_) => Self::conflict("session_exists", e.to_string()),
            GatewayError::NotFound(message) => Self::not_found("not_found", message),
            GatewayError::SessionNotFound(_) => {
                Self::not_found("session_not_found", e.to_string())
            }
            GatewayError::UnknownOperation(_) => {
                Self::not_found("unknown_operation", e.to_string())
            }
            GatewayError::MethodNotAllowed { .. } => {
                Self::method_not_allowed("method_not_allowed", e.to_string())
            }
            GatewayError::NoNodesAvailable => {
                Self::service_unavailable("no_nodes_available", e.to_string())
            }
            GatewayError::CapacityExhausted(_) => {
                Self::service_unavailable("capacity_exhausted", e.to_string())
                    .with_retry_after_seconds(CAPACITY_RETRY_AFTER_SECONDS)
            }
            GatewayError::Upstream(ref upstream) => match upstream {
                NodeApiError::Timeout { .. } => {
                    Self::gateway_timeout("upstream_timeout", e.to_string())
                }
                NodeApiError::InvalidCredential(_) => {
                    error!(error = %e, "Node client misconfigured");
                    Self::internal("internal_error", "Node client is misconfigured")
                }
                _ => Self::bad_gateway("upstream_unreachable", e.to_string()),
            },
            GatewayError::Provisioning(ref failure) => {
                error!(stage = %failure.stage, error = %e, "Provisioning failed");
                Self::internal("provisioning_failed", e.to_string())
            }
            GatewayError::Storage(ref source) => {
                error!(error = %source, "Storage error");
                Self::internal("internal_error", "Storage operation failed")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = self.problem.retry_after_seconds;
        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        if retry_after > 0 {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}
