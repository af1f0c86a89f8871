//! Gateway error taxonomy.

use swarm_node_api::NodeApiError;
use thiserror::Error;

use crate::db::StoreError;
use crate::placement::PlacementError;
use crate::provision::ProvisionError;

/// Errors surfaced by the proxy gateway and the operator surface.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or missing input. User-correctable.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A session with this name is already recorded.
    #[error("session '{0}' already exists")]
    SessionExists(String),

    /// No matching record.
    #[error("{0}")]
    NotFound(String),

    /// The named session has no owning node on record.
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    /// The path does not name a known operation.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// The operation exists but not for this verb.
    #[error("method {method} not allowed for '{operation}'")]
    MethodNotAllowed {
        method: String,
        operation: &'static str,
    },

    /// There are no active nodes at all.
    #[error("no nodes available")]
    NoNodesAvailable,

    /// Every node is at or above threshold; provisioning was requested.
    #[error("capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// A remote node call failed before producing a response.
    #[error("upstream error: {0}")]
    Upstream(#[from] NodeApiError),

    /// A fleet-growth attempt failed.
    #[error(transparent)]
    Provisioning(#[from] ProvisionError),

    /// The persistence layer failed.
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => Self::NotFound(e.to_string()),
            StoreError::Validation(message) => Self::Validation(message),
            other => Self::Storage(other),
        }
    }
}

impl From<PlacementError> for GatewayError {
    fn from(e: PlacementError) -> Self {
        match e {
            PlacementError::NoNodesAvailable => Self::NoNodesAvailable,
            saturated @ PlacementError::Saturated { .. } => {
                Self::CapacityExhausted(saturated.to_string())
            }
        }
    }
}
