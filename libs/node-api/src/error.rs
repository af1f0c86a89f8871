//! Node API error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to a node.
#[derive(Debug, Error)]
pub enum NodeApiError {
    /// The node could not be reached (connect/reset/DNS failure).
    #[error("node {url} unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The node did not answer within the configured timeout.
    #[error("node {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The node answered with a non-success status where one was required.
    #[error("node {url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The node answered with a body we could not decode.
    #[error("node {url} returned an undecodable body: {message}")]
    Decode { url: String, message: String },

    /// The configured credential or header name is not a valid header.
    #[error("invalid node credential header: {0}")]
    InvalidCredential(String),

    /// Building the underlying HTTP client failed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl NodeApiError {
    /// Returns true if the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
