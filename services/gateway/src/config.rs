use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use swarm_node_api::{NodeClientConfig, DEFAULT_API_KEY_HEADER};

use crate::db::DbConfig;
use crate::provision::{ComputeConfig, DeployConfig, DnsConfig, HostTemplate, ProvisionSettings};

/// Which backend holds the node registry and session directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => bail!("unknown store '{other}' (expected postgres or memory)"),
        }
    }
}

/// Node created at startup when the registry is empty.
#[derive(Debug, Clone)]
pub struct BootstrapNode {
    pub name: String,
    pub ip: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub store: StoreKind,
    pub database: DbConfig,

    /// Open sessions per node at which placement stops choosing it.
    pub session_threshold: i64,
    pub reconcile_interval: Duration,

    pub node_client: NodeClientConfig,
    pub compute: ComputeConfig,
    pub dns: DnsConfig,
    pub deploy: DeployConfig,
    pub provision: ProvisionSettings,
    pub bootstrap_node: Option<BootstrapNode>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = var("SWARM_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .context("invalid SWARM_LISTEN_ADDR")?;

        let log_level = var("SWARM_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let dev_mode = var("SWARM_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let store = match var("SWARM_STORE") {
            Some(v) => v.parse()?,
            None => StoreKind::Postgres,
        };

        let session_threshold: i64 = parse_or(&var, "SWARM_SESSION_THRESHOLD", 20)?;
        if session_threshold < 1 {
            bail!("SWARM_SESSION_THRESHOLD must be at least 1");
        }

        let reconcile_interval =
            Duration::from_secs(parse_or(&var, "SWARM_RECONCILE_INTERVAL_SECS", 120)?);
        if reconcile_interval.is_zero() {
            bail!("SWARM_RECONCILE_INTERVAL_SECS must be positive");
        }

        // A zero timeout makes every outbound call fail before it is sent.
        let node_timeout = Duration::from_secs(parse_or(&var, "SWARM_NODE_TIMEOUT_SECS", 15)?);
        if node_timeout.is_zero() {
            bail!("SWARM_NODE_TIMEOUT_SECS must be positive");
        }

        let node_client = NodeClientConfig {
            api_key_header: var("SWARM_NODE_API_KEY_HEADER")
                .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string()),
            api_key: var("SWARM_NODE_API_KEY").unwrap_or_default(),
            timeout: node_timeout,
        };

        let provider_timeout = Duration::from_secs(parse_or(&var, "SWARM_PROVIDER_TIMEOUT_SECS", 30)?);
        if provider_timeout.is_zero() {
            bail!("SWARM_PROVIDER_TIMEOUT_SECS must be positive");
        }

        let compute_defaults = ComputeConfig::default();
        let compute = ComputeConfig {
            base_url: var("SWARM_COMPUTE_BASE_URL").unwrap_or(compute_defaults.base_url),
            token: var("SWARM_COMPUTE_TOKEN").unwrap_or_default(),
            timeout: provider_timeout,
        };

        let dns_defaults = DnsConfig::default();
        let dns = DnsConfig {
            base_url: var("SWARM_DNS_BASE_URL").unwrap_or(dns_defaults.base_url),
            zone_id: var("SWARM_DNS_ZONE_ID").unwrap_or_default(),
            token: var("SWARM_DNS_TOKEN").unwrap_or_default(),
            timeout: provider_timeout,
        };

        let deploy_defaults = DeployConfig::default();
        let deploy = DeployConfig {
            shell: var("SWARM_DEPLOY_SHELL").unwrap_or(deploy_defaults.shell),
            script: var("SWARM_DEPLOY_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(deploy_defaults.script),
            timeout: Duration::from_secs(parse_or(
                &var,
                "SWARM_DEPLOY_TIMEOUT_SECS",
                deploy_defaults.timeout.as_secs(),
            )?),
        };

        let template_defaults = HostTemplate::default();
        let template = HostTemplate {
            image: var("SWARM_COMPUTE_IMAGE").unwrap_or(template_defaults.image),
            server_type: var("SWARM_COMPUTE_SERVER_TYPE").unwrap_or(template_defaults.server_type),
            location: var("SWARM_COMPUTE_LOCATION"),
            firewall_ids: parse_id_list(var("SWARM_COMPUTE_FIREWALL_IDS"))
                .context("invalid SWARM_COMPUTE_FIREWALL_IDS")?,
            ssh_key_ids: parse_id_list(var("SWARM_COMPUTE_SSH_KEY_IDS"))
                .context("invalid SWARM_COMPUTE_SSH_KEY_IDS")?,
        };

        let provision_defaults = ProvisionSettings::default();
        let provision = ProvisionSettings {
            name_prefix: var("SWARM_NODE_NAME_PREFIX").unwrap_or(provision_defaults.name_prefix),
            domain: var("SWARM_NODE_DOMAIN").unwrap_or(provision_defaults.domain),
            template,
            dns_ttl: parse_or(&var, "SWARM_DNS_TTL", provision_defaults.dns_ttl)?,
        };

        let bootstrap_node = match var("SWARM_BOOTSTRAP_NODE_URL") {
            Some(url) => Some(BootstrapNode {
                name: var("SWARM_BOOTSTRAP_NODE_NAME").unwrap_or_else(|| "default".to_string()),
                ip: var("SWARM_BOOTSTRAP_NODE_IP").unwrap_or_default(),
                url,
            }),
            None => None,
        };

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            store,
            database: DbConfig::from_env(),
            session_threshold,
            reconcile_interval,
            node_client,
            compute,
            dns,
            deploy,
            provision,
            bootstrap_node,
        })
    }
}

fn parse_or<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw}")),
        None => Ok(default),
    }
}

fn parse_id_list(raw: Option<String>) -> Result<Vec<i64>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().with_context(|| format!("'{s}' is not an id")))
        .collect()
}
