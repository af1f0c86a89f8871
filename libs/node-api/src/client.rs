//! HTTP client for the node session service.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use crate::error::NodeApiError;
use crate::types::ReportedInstance;
use crate::{DEFAULT_API_KEY_HEADER, FETCH_INSTANCES_PATH};

/// Headers that never cross the gateway.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Node client configuration.
#[derive(Debug, Clone)]
pub struct NodeClientConfig {
    /// Header name carrying the node credential.
    pub api_key_header: String,

    /// Node service credential, shared by every node in the deployment.
    pub api_key: String,

    /// Per-request timeout (connect + response).
    pub timeout: Duration,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// A node response, relayed to the client unmodified.
///
/// `headers` holds the node's end-to-end headers; `body` is exactly what
/// the node sent, so a `content-encoding` header stays valid for it.
#[derive(Debug, Clone)]
pub struct RelayedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RelayedResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.headers.get(CONTENT_TYPE)
    }
}

/// Client shared by the proxy and the reconciler.
#[derive(Clone)]
pub struct NodeClient {
    client: reqwest::Client,
    api_key_header: HeaderName,
    api_key: HeaderValue,
    timeout: Duration,
}

impl NodeClient {
    /// Create a new node client.
    pub fn new(config: &NodeClientConfig) -> Result<Self, NodeApiError> {
        let api_key_header = HeaderName::from_bytes(config.api_key_header.as_bytes())
            .map_err(|e| NodeApiError::InvalidCredential(e.to_string()))?;
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| NodeApiError::InvalidCredential(e.to_string()))?;
        api_key.set_sensitive(true);

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(NodeApiError::Client)?;

        Ok(Self {
            client,
            api_key_header,
            api_key,
            timeout: config.timeout,
        })
    }

    /// Relay a call to a node.
    ///
    /// Method, path, query, body and end-to-end headers are preserved; only
    /// the authority and the credential header are replaced. Any status the
    /// node answers with is returned as `Ok`.
    pub async fn forward(
        &self,
        base_url: &str,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<RelayedResponse, NodeApiError> {
        let url = join_url(base_url, path_and_query);

        let mut outbound = HeaderMap::new();
        for (name, value) in headers.iter() {
            if is_hop_by_hop(name) || *name == self.api_key_header {
                continue;
            }
            outbound.append(name.clone(), value.clone());
        }
        outbound.insert(self.api_key_header.clone(), self.api_key.clone());

        debug!(url = %url, method = %method, "Forwarding call to node");

        let response = self
            .client
            .request(method, &url)
            .headers(outbound)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(&url, e))?;

        let status = response.status();
        let headers = end_to_end(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(&url, e))?;

        if !status.is_success() {
            warn!(url = %url, status = %status, "Node answered with non-success status");
        }

        Ok(RelayedResponse {
            status,
            headers,
            body,
        })
    }

    /// Fetch the live session list of a node.
    pub async fn fetch_instances(
        &self,
        base_url: &str,
    ) -> Result<Vec<ReportedInstance>, NodeApiError> {
        let url = join_url(base_url, FETCH_INSTANCES_PATH);
        debug!(url = %url, "Fetching node instances");

        let response = self
            .client
            .get(&url)
            .header(self.api_key_header.clone(), self.api_key.clone())
            .send()
            .await
            .map_err(|e| self.classify(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NodeApiError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(&url, e))?;

        ReportedInstance::parse_list(&body).map_err(|e| NodeApiError::Decode {
            url,
            message: e.to_string(),
        })
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> NodeApiError {
        if error.is_timeout() {
            NodeApiError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            NodeApiError::Unreachable {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    let mut kept = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name) {
            kept.append(name.clone(), value.clone());
        }
    }
    kept
}

fn join_url(base_url: &str, path_and_query: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path_and_query.trim_start_matches('/')
    )
}
