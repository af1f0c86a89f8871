//! Fleet provisioning.
//!
//! Adds a node to the fleet when placement reports saturation. A
//! provisioning attempt runs these stages in order, stopping at the first
//! failure without compensating earlier stages:
//!
//! 1. Naming: generate a unique, time-derived node name
//! 2. Compute: create a host from the fixed template and get its IPv4
//! 3. Dns: point `<name>.<domain>` at the IPv4
//! 4. Deploy: install the session service on the host
//! 5. Persist: register the node
//!
//! A node is only registered if every stage before Persist succeeded.
//!
//! Concurrent saturation signals can start more than one attempt before the
//! first new node is visible. That race is tolerated: extra capacity is
//! harmless, and serializing attempts would delay recovery.

mod compute;
mod deploy;
mod dns;
mod queue;

pub use compute::{ComputeApi, ComputeConfig, CreateHost, HetznerCompute, HostTemplate, ProvisionedHost};
pub use deploy::{DeployConfig, Deployer, ScriptDeployer};
pub use dns::{CloudflareDns, DnsApi, DnsConfig, DnsRecord};
pub use queue::{ProvisionQueue, ProvisionRequest, ProvisionWorker};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use crate::db::NodeStore;
use crate::model::{NewNode, Node};

/// Errors from external provider calls (compute, DNS, deploy).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    Decode(String),

    #[error("command failed: {0}")]
    Exec(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Provisioning stage, reported on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    Naming,
    Compute,
    Dns,
    Deploy,
    Persist,
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Naming => "naming",
            Self::Compute => "compute",
            Self::Dns => "dns",
            Self::Deploy => "deploy",
            Self::Persist => "persist",
        };
        f.write_str(s)
    }
}

/// A failed provisioning attempt.
#[derive(Debug, Error)]
#[error("provisioning failed at {stage} stage: {message}")]
pub struct ProvisionError {
    pub stage: ProvisionStage,
    pub message: String,
}

impl ProvisionError {
    fn at(stage: ProvisionStage, error: impl fmt::Display) -> Self {
        Self {
            stage,
            message: error.to_string(),
        }
    }
}

/// Fixed parameters of every provisioning attempt.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// Node name prefix; the rest of the name is a timestamp.
    pub name_prefix: String,

    /// DNS zone the node hostnames live in.
    pub domain: String,

    /// Host template passed to the compute provider.
    pub template: HostTemplate,

    /// TTL of the node A record, in seconds.
    pub dns_ttl: u32,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            name_prefix: "eapi".to_string(),
            domain: "example.com".to_string(),
            template: HostTemplate::default(),
            dns_ttl: 120,
        }
    }
}

/// Runs provisioning attempts against the injected providers.
pub struct Provisioner {
    nodes: Arc<dyn NodeStore>,
    compute: Arc<dyn ComputeApi>,
    dns: Arc<dyn DnsApi>,
    deployer: Arc<dyn Deployer>,
    settings: ProvisionSettings,
}

impl Provisioner {
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        compute: Arc<dyn ComputeApi>,
        dns: Arc<dyn DnsApi>,
        deployer: Arc<dyn Deployer>,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            nodes,
            compute,
            dns,
            deployer,
            settings,
        }
    }

    /// Bring one new node online and register it.
    #[instrument(skip(self))]
    pub async fn provision_node(&self) -> Result<Node, ProvisionError> {
        let name = self.generate_name(Utc::now()).await?;
        info!(name = %name, "Provisioning node");

        let host = self
            .compute
            .create_host(&CreateHost {
                name: name.clone(),
                template: self.settings.template.clone(),
            })
            .await
            .map_err(|e| ProvisionError::at(ProvisionStage::Compute, e))?;
        info!(name = %name, host_id = host.host_id, ipv4 = %host.ipv4, "Host created");

        let hostname = format!("{name}.{}", self.settings.domain);
        self.dns
            .create_record(&DnsRecord::a(&hostname, host.ipv4, self.settings.dns_ttl))
            .await
            .map_err(|e| ProvisionError::at(ProvisionStage::Dns, e))?;
        info!(hostname = %hostname, "DNS record created");

        self.deployer
            .deploy(host.ipv4, &name)
            .await
            .map_err(|e| ProvisionError::at(ProvisionStage::Deploy, e))?;
        info!(name = %name, "Session service deployed");

        let node = self
            .nodes
            .create(NewNode {
                name,
                ip: host.ipv4.to_string(),
                url: format!("https://{hostname}"),
                active: true,
                capacity: None,
            })
            .await
            .map_err(|e| ProvisionError::at(ProvisionStage::Persist, e))?;

        info!(node_id = %node.id, url = %node.url, "Node registered");
        Ok(node)
    }

    /// `<prefix><YYYYMMDDHHMMSSmmm>`, suffixed when the name is taken.
    async fn generate_name(&self, now: DateTime<Utc>) -> Result<String, ProvisionError> {
        let existing: HashSet<String> = self
            .nodes
            .list()
            .await
            .map_err(|e| ProvisionError::at(ProvisionStage::Naming, e))?
            .into_iter()
            .map(|n| n.name)
            .collect();

        Ok(unique_name(&self.settings.name_prefix, now, &existing))
    }
}

fn unique_name(prefix: &str, now: DateTime<Utc>, existing: &HashSet<String>) -> String {
    let base = format!(
        "{}{}",
        prefix.to_ascii_lowercase(),
        now.format("%Y%m%d%H%M%S%3f")
    );
    if !existing.contains(&base) {
        return base;
    }
    // The suffix only steps around persisted names. Two attempts in the same
    // millisecond read the registry before either persists and get the same
    // name; the later one then fails at a provider or on the unique node url.
    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCompute {
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ComputeApi for FakeCompute {
        async fn create_host(&self, request: &CreateHost) -> Result<ProvisionedHost, ProviderError> {
            self.calls.lock().unwrap().push(request.name.clone());
            if self.fail {
                return Err(ProviderError::Status {
                    status: 403,
                    body: "forbidden".to_string(),
                });
            }
            Ok(ProvisionedHost {
                host_id: 7,
                ipv4: Ipv4Addr::new(203, 0, 113, 7),
            })
        }
    }

    #[derive(Default)]
    struct FakeDns {
        fail: bool,
        records: Mutex<Vec<DnsRecord>>,
    }

    #[async_trait]
    impl DnsApi for FakeDns {
        async fn create_record(&self, record: &DnsRecord) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError::Decode("zone not found".to_string()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDeployer {
        fail: bool,
        deployed: Mutex<Vec<(Ipv4Addr, String)>>,
    }

    #[async_trait]
    impl Deployer for FakeDeployer {
        async fn deploy(&self, ip: Ipv4Addr, name: &str) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError::Exec("exit status 1".to_string()));
            }
            self.deployed.lock().unwrap().push((ip, name.to_string()));
            Ok(())
        }
    }

    fn settings() -> ProvisionSettings {
        ProvisionSettings {
            domain: "fleet.test".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_provision_node_runs_all_stages() {
        let store = MemoryStore::new();
        let dns = Arc::new(FakeDns::default());
        let deployer = Arc::new(FakeDeployer::default());
        let provisioner = Provisioner::new(
            Arc::new(store.clone()),
            Arc::new(FakeCompute::default()),
            dns.clone(),
            deployer.clone(),
            settings(),
        );

        let node = provisioner.provision_node().await.unwrap();

        assert!(node.name.starts_with("eapi"));
        assert_eq!(node.ip, "203.0.113.7");
        assert_eq!(node.url, format!("https://{}.fleet.test", node.name));
        assert!(node.active);

        let records = dns.records.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, format!("{}.fleet.test", node.name));
        assert_eq!(records[0].content, "203.0.113.7");
        assert_eq!(records[0].record_type, "A");

        let deployed = deployer.deployed.lock().unwrap().clone();
        assert_eq!(deployed, vec![(Ipv4Addr::new(203, 0, 113, 7), node.name.clone())]);

        assert_eq!(NodeStore::list(&store).await.unwrap(), vec![node]);
    }

    #[tokio::test]
    async fn test_compute_failure_stops_before_dns() {
        let store = MemoryStore::new();
        let dns = Arc::new(FakeDns::default());
        let provisioner = Provisioner::new(
            Arc::new(store.clone()),
            Arc::new(FakeCompute {
                fail: true,
                ..Default::default()
            }),
            dns.clone(),
            Arc::new(FakeDeployer::default()),
            settings(),
        );

        let err = provisioner.provision_node().await.unwrap_err();
        assert_eq!(err.stage, ProvisionStage::Compute);
        assert!(dns.records.lock().unwrap().is_empty());
        assert!(NodeStore::list(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dns_failure_persists_nothing() {
        let store = MemoryStore::new();
        let deployer = Arc::new(FakeDeployer::default());
        let provisioner = Provisioner::new(
            Arc::new(store.clone()),
            Arc::new(FakeCompute::default()),
            Arc::new(FakeDns {
                fail: true,
                ..Default::default()
            }),
            deployer.clone(),
            settings(),
        );

        let err = provisioner.provision_node().await.unwrap_err();
        assert_eq!(err.stage, ProvisionStage::Dns);
        assert!(err.to_string().contains("dns stage"));
        assert!(deployer.deployed.lock().unwrap().is_empty());
        assert!(NodeStore::list(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_failure_persists_nothing() {
        let store = MemoryStore::new();
        let provisioner = Provisioner::new(
            Arc::new(store.clone()),
            Arc::new(FakeCompute::default()),
            Arc::new(FakeDns::default()),
            Arc::new(FakeDeployer {
                fail: true,
                ..Default::default()
            }),
            settings(),
        );

        let err = provisioner.provision_node().await.unwrap_err();
        assert_eq!(err.stage, ProvisionStage::Deploy);
        assert!(NodeStore::list(&store).await.unwrap().is_empty());
    }

    #[test]
    fn test_unique_name_avoids_existing() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let mut existing = HashSet::new();

        let first = unique_name("EAPI", now, &existing);
        assert_eq!(first, "eapi20240305140709000");

        existing.insert(first.clone());
        let second = unique_name("EAPI", now, &existing);
        assert_eq!(second, "eapi20240305140709000-1");

        existing.insert(second);
        assert_eq!(
            unique_name("EAPI", now, &existing),
            "eapi20240305140709000-2"
        );
    }
}
