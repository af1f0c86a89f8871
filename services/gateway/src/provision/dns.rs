//! DNS provider: binds a node hostname to its IPv4.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

impl DnsRecord {
    /// Unproxied A record.
    pub fn a(name: impl Into<String>, ip: Ipv4Addr, ttl: u32) -> Self {
        Self {
            record_type: "A".to_string(),
            name: name.into(),
            content: ip.to_string(),
            ttl,
            proxied: false,
        }
    }
}

#[async_trait]
pub trait DnsApi: Send + Sync {
    async fn create_record(&self, record: &DnsRecord) -> Result<(), ProviderError>;
}

/// DNS provider configuration.
#[derive(Debug, Clone)]
pub struct DnsConfig {
    pub base_url: String,
    pub zone_id: String,
    pub token: String,
    pub timeout: Duration,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cloudflare.com/client/v4".to_string(),
            zone_id: String::new(),
            token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Cloudflare `POST /zones/{zone}/dns_records`.
pub struct CloudflareDns {
    client: reqwest::Client,
    base_url: String,
    zone_id: String,
    token: String,
}

impl CloudflareDns {
    pub fn new(config: &DnsConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            zone_id: config.zone_id.clone(),
            token: config.token.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    success: bool,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[async_trait]
impl DnsApi for CloudflareDns {
    async fn create_record(&self, record: &DnsRecord) -> Result<(), ProviderError> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, self.zone_id);
        debug!(url = %url, name = %record.name, content = %record.content, "Creating DNS record");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(record)
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

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        if !envelope.success {
            return Err(ProviderError::Decode(format!(
                "record rejected: {}",
                serde_json::Value::Array(envelope.errors)
            )));
        }

        Ok(())
    }
}
