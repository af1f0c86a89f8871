//! Deploys the session service stack onto a freshly created host.
//!
//! The deploy step is opaque: it either succeeds or fails.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::ProviderError;

#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, ip: Ipv4Addr, name: &str) -> Result<(), ProviderError>;
}

/// Deploy script configuration.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub shell: String,
    pub script: PathBuf,
    pub timeout: Duration,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            script: PathBuf::from("stacks/deploy_stack.sh"),
            timeout: Duration::from_secs(900),
        }
    }
}

/// Runs `<shell> <script> <ip> <name>`.
pub struct ScriptDeployer {
    config: DeployConfig,
}

impl ScriptDeployer {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Deployer for ScriptDeployer {
    async fn deploy(&self, ip: Ipv4Addr, name: &str) -> Result<(), ProviderError> {
        debug!(
            script = %self.config.script.display(),
            ip = %ip,
            name = %name,
            "Running deploy script"
        );

        let child = Command::new(&self.config.shell)
            .arg(&self.config.script)
            .arg(ip.to_string())
            .arg(name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.config.timeout, child)
            .await
            .map_err(|_| ProviderError::Timeout(self.config.timeout))?
            .map_err(|e| ProviderError::Exec(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(ProviderError::Exec(format!("{}: {}", output.status, tail)));
        }

        Ok(())
    }
}
