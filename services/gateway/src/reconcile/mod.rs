//! Periodic session status reconciliation.

mod reconciler;

pub use reconciler::{ReconcileStats, Reconciler};

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

/// Runs the reconciler on a fixed interval.
pub struct ReconcileWorker {
    reconciler: Reconciler,
    interval: Duration,
}

impl ReconcileWorker {
    pub fn new(reconciler: Reconciler, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run the worker until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting reconcile worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; wait a full interval instead.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.run_pass().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reconcile worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_pass(&self) {
        match self.reconciler.reconcile_all().await {
            Ok(stats) => {
                info!(
                    nodes_polled = stats.nodes_polled,
                    nodes_failed = stats.nodes_failed,
                    sessions_updated = stats.sessions_updated,
                    sessions_unknown = stats.sessions_unknown,
                    "Reconciliation complete"
                );
            }
            Err(e) => error!(error = %e, "Reconciliation failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::sync::Arc;
    use swarm_node_api::{NodeClient, NodeClientConfig};

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let store = MemoryStore::new();
        let client = NodeClient::new(&NodeClientConfig::default()).unwrap();
        let worker = ReconcileWorker::new(
            Reconciler::new(Arc::new(store.clone()), Arc::new(store), client),
            Duration::from_millis(10),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { worker.run(rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
