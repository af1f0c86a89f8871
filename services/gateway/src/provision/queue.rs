//! Provisioning work queue.
//!
//! Placement submits requests without waiting; the worker starts one
//! detached attempt per request. Outcomes are only visible through the node
//! registry and the logs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument, warn};

use super::Provisioner;

/// A request for one more node.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

impl ProvisionRequest {
    pub fn saturated(nodes: usize, threshold: i64) -> Self {
        Self {
            reason: format!("all {nodes} nodes at or above threshold {threshold}"),
            requested_at: Utc::now(),
        }
    }
}

/// Sending half of the provisioning queue.
#[derive(Clone)]
pub struct ProvisionQueue {
    tx: mpsc::UnboundedSender<ProvisionRequest>,
}

impl ProvisionQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProvisionRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Submit a request. Returns false if the worker is gone.
    pub fn submit(&self, request: ProvisionRequest) -> bool {
        match self.tx.send(request) {
            Ok(()) => true,
            Err(_) => {
                warn!("Provisioning worker is not running; request dropped");
                false
            }
        }
    }
}

/// Drains the queue, starting a detached provisioning attempt per request.
pub struct ProvisionWorker {
    provisioner: Arc<Provisioner>,
    rx: mpsc::UnboundedReceiver<ProvisionRequest>,
}

impl ProvisionWorker {
    pub fn new(provisioner: Arc<Provisioner>, rx: mpsc::UnboundedReceiver<ProvisionRequest>) -> Self {
        Self { provisioner, rx }
    }

    /// Run until shutdown is signaled or every queue handle is dropped.
    ///
    /// Attempts already started keep running after shutdown.
    #[instrument(skip(self, shutdown))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting provisioning worker");

        loop {
            tokio::select! {
                request = self.rx.recv() => {
                    let Some(request) = request else {
                        info!("Provisioning queue closed");
                        break;
                    };
                    self.start_attempt(request);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Provisioning worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn start_attempt(&self, request: ProvisionRequest) {
        info!(
            reason = %request.reason,
            requested_at = %request.requested_at,
            "Starting provisioning attempt"
        );

        let provisioner = self.provisioner.clone();
        tokio::spawn(async move {
            match provisioner.provision_node().await {
                Ok(node) => {
                    info!(node_id = %node.id, name = %node.name, url = %node.url, "Provisioning succeeded");
                }
                Err(e) => {
                    error!(stage = %e.stage, error = %e, "Provisioning failed");
                }
            }
        });
    }
}
