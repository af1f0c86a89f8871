//! In-memory node registry and session directory.
//!
//! Mirrors the Postgres semantics (uniqueness, active-node binding, snapshot
//! ordering) so components can be exercised without a database.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{NodeStore, SessionStore, StoreError};
use crate::model::{
    NewNode, NewSession, Node, NodeId, NodeLoad, NodeUpdate, Session, SessionFilter, SessionId,
    SessionKey, SessionStatus, SessionUpdate,
};

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<NodeId, Node>,
    sessions: BTreeMap<SessionId, Session>,
    next_node_id: i64,
    next_session_id: i64,
}

/// Shared in-memory store implementing both seams.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Node>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.nodes.values().cloned().collect())
    }

    async fn get(&self, id: NodeId) -> Result<Node, StoreError> {
        let inner = self.inner.read().await;
        inner
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("node", id))
    }

    async fn create(&self, node: NewNode) -> Result<Node, StoreError> {
        if node.name.trim().is_empty() {
            return Err(StoreError::Validation("node name cannot be empty".to_string()));
        }
        if node.url.trim().is_empty() {
            return Err(StoreError::Validation("node url cannot be empty".to_string()));
        }

        let mut inner = self.inner.write().await;
        if inner.nodes.values().any(|n| n.url == node.url) {
            return Err(StoreError::Validation(format!(
                "duplicate node url {}",
                node.url
            )));
        }

        inner.next_node_id += 1;
        let id = NodeId(inner.next_node_id);
        let node = Node {
            id,
            name: node.name,
            ip: node.ip,
            url: node.url,
            active: node.active,
            capacity: node.capacity,
            created_at: Utc::now(),
        };
        inner.nodes.insert(id, node.clone());
        Ok(node)
    }

    async fn update(&self, id: NodeId, update: NodeUpdate) -> Result<Node, StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(url) = update.url.as_ref().filter(|u| !u.is_empty()) {
            if inner.nodes.values().any(|n| n.id != id && &n.url == url) {
                return Err(StoreError::Validation(format!("duplicate node url {url}")));
            }
        }

        let node = inner
            .nodes
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("node", id))?;
        update.apply(node);
        Ok(node.clone())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find(&self, key: SessionKey) -> Result<Session, StoreError> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .values()
            .find(|s| key.matches(s))
            .cloned()
            .ok_or_else(|| StoreError::not_found("session", &key))
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .filter(|s| match filter {
                SessionFilter::All => true,
                SessionFilter::ByNode(node_id) => s.node_id == node_id,
            })
            .cloned()
            .collect())
    }

    async fn create(&self, session: NewSession) -> Result<Session, StoreError> {
        if session.name.trim().is_empty() {
            return Err(StoreError::Validation(
                "session name cannot be empty".to_string(),
            ));
        }

        let mut inner = self.inner.write().await;
        if inner.sessions.values().any(|s| s.name == session.name) {
            return Err(StoreError::Validation(format!(
                "duplicate session name {}",
                session.name
            )));
        }
        if !inner
            .nodes
            .get(&session.node_id)
            .is_some_and(|n| n.active)
        {
            return Err(StoreError::Validation(format!(
                "node {} does not exist or is inactive",
                session.node_id
            )));
        }

        inner.next_session_id += 1;
        let id = SessionId(inner.next_session_id);
        let session = Session {
            id,
            name: session.name,
            status: session.status,
            node_id: session.node_id,
            apikey: session.apikey,
            updated_at: Utc::now(),
        };
        inner.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn update(&self, key: SessionKey, update: SessionUpdate) -> Result<Session, StoreError> {
        let mut inner = self.inner.write().await;

        let id = inner
            .sessions
            .values()
            .find(|s| key.matches(s))
            .map(|s| s.id)
            .ok_or_else(|| StoreError::not_found("session", &key))?;

        let new_name = update.name.filter(|n| !n.trim().is_empty());
        if let Some(name) = &new_name {
            if inner.sessions.values().any(|s| s.id != id && &s.name == name) {
                return Err(StoreError::Validation(format!(
                    "duplicate session name {name}"
                )));
            }
        }

        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("session", id))?;
        if let Some(name) = new_name {
            session.name = name;
        }
        if let Some(status) = update.status {
            session.status = status;
        }
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn delete(&self, key: SessionKey) -> Result<Session, StoreError> {
        let mut inner = self.inner.write().await;
        let id = inner
            .sessions
            .values()
            .find(|s| key.matches(s))
            .map(|s| s.id)
            .ok_or_else(|| StoreError::not_found("session", &key))?;

        inner
            .sessions
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("session", id))
    }

    async fn delete_for_node(&self, node_id: NodeId) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.node_id != node_id);
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn load_snapshot(&self) -> Result<Vec<NodeLoad>, StoreError> {
        let inner = self.inner.read().await;

        let mut loads: Vec<NodeLoad> = inner
            .nodes
            .values()
            .filter(|n| n.active)
            .map(|n| NodeLoad {
                node_id: n.id,
                name: n.name.clone(),
                url: n.url.clone(),
                open_count: inner
                    .sessions
                    .values()
                    .filter(|s| s.node_id == n.id && s.status == SessionStatus::Open)
                    .count() as i64,
            })
            .collect();

        loads.sort_by(|a, b| {
            b.open_count
                .cmp(&a.open_count)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        Ok(loads)
    }
}
