//! Session status reconciler.
//!
//! Pulls each registered node's live session report, inactive ones
//! included, and corrects the recorded status of the sessions it mentions. Sessions are matched by client
//! token; reports for tokens the directory does not know are skipped and
//! never create rows.

use std::collections::HashSet;
use std::sync::Arc;

use swarm_node_api::{NodeClient, NodeApiError, ReportedInstance};
use tracing::{debug, info, instrument, warn};

use crate::db::{NodeStore, SessionStore, StoreError};
use crate::model::{SessionKey, SessionStatus};

/// Statistics from one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub nodes_polled: u32,
    pub nodes_failed: u32,
    pub sessions_updated: u32,
    pub sessions_unchanged: u32,
    pub sessions_unknown: u32,
    /// Report entries without a token or with an unrecognised status.
    pub entries_skipped: u32,
}

#[derive(Debug, thiserror::Error)]
enum NodeFailure {
    #[error(transparent)]
    Fetch(#[from] NodeApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Reconciler {
    nodes: Arc<dyn NodeStore>,
    sessions: Arc<dyn SessionStore>,
    client: NodeClient,
}

impl Reconciler {
    pub fn new(nodes: Arc<dyn NodeStore>, sessions: Arc<dyn SessionStore>, client: NodeClient) -> Self {
        Self {
            nodes,
            sessions,
            client,
        }
    }

    /// Reconcile every distinct node URL.
    ///
    /// Inactive nodes are polled too: they take no new sessions but keep
    /// hosting the ones bound to them. A node that cannot be fetched is
    /// logged and counted; the pass moves on.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<ReconcileStats, StoreError> {
        let mut stats = ReconcileStats::default();

        let mut seen = HashSet::new();
        let urls: Vec<String> = self
            .nodes
            .list()
            .await?
            .into_iter()
            .map(|node| node.url)
            .filter(|url| seen.insert(url.clone()))
            .collect();
        debug!(node_count = urls.len(), "Found nodes to reconcile");

        for url in urls {
            match self.reconcile_node(&url, &mut stats).await {
                Ok(()) => stats.nodes_polled += 1,
                Err(e) => {
                    stats.nodes_failed += 1;
                    warn!(url = %url, error = %e, "Failed to reconcile node");
                }
            }
        }

        Ok(stats)
    }

    async fn reconcile_node(&self, url: &str, stats: &mut ReconcileStats) -> Result<(), NodeFailure> {
        let reported = self.client.fetch_instances(url).await?;
        debug!(url = %url, instances = reported.len(), "Fetched node report");

        for entry in reported {
            self.reconcile_entry(entry, stats).await?;
        }
        Ok(())
    }

    async fn reconcile_entry(
        &self,
        entry: ReportedInstance,
        stats: &mut ReconcileStats,
    ) -> Result<(), StoreError> {
        let Some(token) = entry.api_key.filter(|t| !t.is_empty()) else {
            stats.entries_skipped += 1;
            return Ok(());
        };
        let Some(status) = entry
            .status
            .as_deref()
            .and_then(|s| s.parse::<SessionStatus>().ok())
        else {
            stats.entries_skipped += 1;
            return Ok(());
        };

        let session = match self.sessions.find(SessionKey::ByCredential(token)).await {
            Ok(session) => session,
            Err(e) if e.is_not_found() => {
                stats.sessions_unknown += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if session.status == status {
            stats.sessions_unchanged += 1;
            return Ok(());
        }

        self.sessions
            .set_status(SessionKey::ById(session.id), status)
            .await?;
        stats.sessions_updated += 1;
        info!(
            session = %session.name,
            from = %session.status,
            to = %status,
            "Reconciled session status"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::model::{NewNode, NewSession, Node, NodeUpdate, SessionFilter};
    use std::time::Duration;
    use swarm_node_api::NodeClientConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> NodeClient {
        NodeClient::new(&NodeClientConfig {
            api_key: "node-secret".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap()
    }

    async fn node(store: &MemoryStore, name: &str, url: &str, active: bool) -> Node {
        NodeStore::create(
            store,
            NewNode {
                name: name.to_string(),
                ip: "10.0.0.2".to_string(),
                url: url.to_string(),
                active,
                capacity: None,
            },
        )
        .await
        .unwrap()
    }

    async fn session(store: &MemoryStore, name: &str, node: &Node, token: &str, status: SessionStatus) {
        SessionStore::create(
            store,
            NewSession {
                name: name.to_string(),
                status,
                node_id: node.id,
                apikey: token.to_string(),
            },
        )
        .await
        .unwrap();
    }

    async fn status_of(store: &MemoryStore, name: &str) -> SessionStatus {
        store
            .find(SessionKey::ByName(name.to_string()))
            .await
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn test_reconcile_updates_known_sessions_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instance/fetchInstances"))
            .and(header("apikey", "node-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"instance": {"instanceName": "alice", "status": "open", "apikey": "tok-a"}},
                {"instanceName": "bob", "connectionStatus": "close", "apikey": "tok-b"},
                {"instanceName": "carol", "status": "open", "apikey": "tok-unknown"},
                {"instanceName": "dave", "status": "open"},
                {"instanceName": "erin", "status": "refused", "apikey": "tok-e"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let n = node(&store, "n1", &server.uri(), true).await;
        session(&store, "alice", &n, "tok-a", SessionStatus::Connecting).await;
        session(&store, "bob", &n, "tok-b", SessionStatus::Open).await;

        let reconciler = Reconciler::new(Arc::new(store.clone()), Arc::new(store.clone()), client());
        let stats = reconciler.reconcile_all().await.unwrap();

        assert_eq!(stats.nodes_polled, 1);
        assert_eq!(stats.nodes_failed, 0);
        assert_eq!(stats.sessions_updated, 2);
        assert_eq!(stats.sessions_unknown, 1);
        assert_eq!(stats.entries_skipped, 2);

        assert_eq!(status_of(&store, "alice").await, SessionStatus::Open);
        assert_eq!(status_of(&store, "bob").await, SessionStatus::Close);
        assert_eq!(
            SessionStore::list(&store, SessionFilter::All).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_failing_node_does_not_stop_the_pass() {
        let healthy = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instance/fetchInstances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"instanceName": "alice", "status": "open", "apikey": "tok-a"}
            ])))
            .mount(&healthy)
            .await;
        let broken = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&broken)
            .await;

        let store = MemoryStore::new();
        node(&store, "broken", &broken.uri(), true).await;
        node(&store, "down", "http://127.0.0.1:1", true).await;
        let n = node(&store, "healthy", &healthy.uri(), true).await;
        session(&store, "alice", &n, "tok-a", SessionStatus::Connecting).await;

        let reconciler = Reconciler::new(Arc::new(store.clone()), Arc::new(store.clone()), client());
        let stats = reconciler.reconcile_all().await.unwrap();

        assert_eq!(stats.nodes_polled, 1);
        assert_eq!(stats.nodes_failed, 2);
        assert_eq!(status_of(&store, "alice").await, SessionStatus::Open);
    }

    #[tokio::test]
    async fn test_inactive_nodes_are_still_polled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instance/fetchInstances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"instanceName": "alice", "status": "close", "apikey": "tok-a"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let retired = node(&store, "retired", &server.uri(), true).await;
        session(&store, "alice", &retired, "tok-a", SessionStatus::Open).await;
        NodeStore::update(
            &store,
            retired.id,
            NodeUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let reconciler = Reconciler::new(Arc::new(store.clone()), Arc::new(store.clone()), client());
        let stats = reconciler.reconcile_all().await.unwrap();

        assert_eq!(stats.nodes_polled, 1);
        assert_eq!(stats.sessions_updated, 1);
        assert_eq!(status_of(&store, "alice").await, SessionStatus::Close);
    }
}
