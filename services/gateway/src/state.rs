//! Application state shared across request handlers.

use std::sync::Arc;

use crate::db::{NodeStore, SessionStore};
use crate::gateway::Gateway;
use crate::provision::Provisioner;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    nodes: Arc<dyn NodeStore>,
    sessions: Arc<dyn SessionStore>,
    gateway: Gateway,
    provisioner: Arc<Provisioner>,
}

impl AppState {
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        sessions: Arc<dyn SessionStore>,
        gateway: Gateway,
        provisioner: Arc<Provisioner>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                nodes,
                sessions,
                gateway,
                provisioner,
            }),
        }
    }

    /// Node registry.
    pub fn nodes(&self) -> &dyn NodeStore {
        self.inner.nodes.as_ref()
    }

    /// Session directory.
    pub fn sessions(&self) -> &dyn SessionStore {
        self.inner.sessions.as_ref()
    }

    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.inner.provisioner
    }
}
