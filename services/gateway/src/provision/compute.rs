//! Compute provider: creates the virtual host for a new node.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ProviderError;

/// Fixed host template used for every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTemplate {
    pub image: String,
    pub server_type: String,
    pub location: Option<String>,
    pub firewall_ids: Vec<i64>,
    pub ssh_key_ids: Vec<i64>,
}

impl Default for HostTemplate {
    fn default() -> Self {
        Self {
            image: "ubuntu-22.04".to_string(),
            server_type: "cx11".to_string(),
            location: None,
            firewall_ids: Vec::new(),
            ssh_key_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateHost {
    pub name: String,
    pub template: HostTemplate,
}

/// A host the provider has created and booted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedHost {
    pub host_id: i64,
    pub ipv4: Ipv4Addr,
}

#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Create a host from the template and request immediate boot.
    async fn create_host(&self, request: &CreateHost) -> Result<ProvisionedHost, ProviderError>;
}

/// Compute provider configuration.
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.hetzner.cloud/v1".to_string(),
            token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Hetzner Cloud `POST /servers`.
pub struct HetznerCompute {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HetznerCompute {
    pub fn new(config: &ComputeConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct CreateServerRequest<'a> {
    name: &'a str,
    server_type: &'a str,
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    firewalls: Vec<FirewallRef>,
    ssh_keys: &'a [i64],
    start_after_create: bool,
}

#[derive(Debug, Serialize)]
struct FirewallRef {
    firewall: i64,
}

#[derive(Debug, Deserialize)]
struct CreateServerResponse {
    server: ServerBody,
}

#[derive(Debug, Deserialize)]
struct ServerBody {
    id: i64,
    public_net: PublicNet,
}

#[derive(Debug, Deserialize)]
struct PublicNet {
    ipv4: Option<Ipv4Block>,
}

#[derive(Debug, Deserialize)]
struct Ipv4Block {
    ip: Ipv4Addr,
}

#[async_trait]
impl ComputeApi for HetznerCompute {
    async fn create_host(&self, request: &CreateHost) -> Result<ProvisionedHost, ProviderError> {
        let template = &request.template;
        let body = CreateServerRequest {
            name: &request.name,
            server_type: &template.server_type,
            image: &template.image,
            location: template.location.as_deref(),
            firewalls: template
                .firewall_ids
                .iter()
                .map(|&firewall| FirewallRef { firewall })
                .collect(),
            ssh_keys: &template.ssh_key_ids,
            start_after_create: true,
        };

        let url = format!("{}/servers", self.base_url);
        debug!(url = %url, name = %request.name, "Creating host");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateServerResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let ipv4 = created
            .server
            .public_net
            .ipv4
            .map(|block| block.ip)
            .ok_or_else(|| ProviderError::Decode("host has no public IPv4".to_string()))?;

        Ok(ProvisionedHost {
            host_id: created.server.id,
            ipv4,
        })
    }
}
