//! Proxy gateway.
//!
//! Resolves an inbound `/instance/...` call to the node that owns (or will
//! own) the session, relays it, and mirrors successful outcomes into the
//! session directory.
//!
//! Forwarding keeps the method, path, query, body and end-to-end headers;
//! only the authority and the node credential header change. Node responses
//! are relayed verbatim, whatever their status. Local state is only touched
//! after a 2xx from the node, and calls are never retried here.

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use swarm_node_api::{ConnectionStateReport, CreateInstanceRequest, NodeClient, RelayedResponse};
use tracing::{error, info, warn};

use crate::db::{NodeStore, SessionStore};
use crate::error::GatewayError;
use crate::model::{NewSession, Session, SessionKey, SessionStatus};
use crate::placement::PlacementPolicy;

/// Session lifecycle operations exposed under `/instance/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Connect,
    ConnectionState,
    Logout,
    Delete,
    Restart,
}

const OPERATIONS: &[Operation] = &[
    Operation::Create,
    Operation::Connect,
    Operation::ConnectionState,
    Operation::Logout,
    Operation::Delete,
    Operation::Restart,
];

impl Operation {
    /// Path segment naming the operation.
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Connect => "connect",
            Self::ConnectionState => "connectionState",
            Self::Logout => "logout",
            Self::Delete => "delete",
            Self::Restart => "restart",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::Create => Method::POST,
            Self::Connect | Self::ConnectionState => Method::GET,
            Self::Logout | Self::Delete => Method::DELETE,
            Self::Restart => Method::PUT,
        }
    }

    /// Whether the path carries a trailing session name.
    pub fn takes_session_name(&self) -> bool {
        !matches!(self, Self::Create)
    }

    pub fn lookup(segment: &str) -> Option<Self> {
        OPERATIONS.iter().copied().find(|op| op.segment() == segment)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// What an inbound path resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCall {
    Create,
    Session { operation: Operation, name: String },
}

/// Resolve the path after `/instance/` into an operation.
///
/// The trailing segment is stripped and the remainder matched against the
/// operation table; if the remainder is not an operation, the whole route
/// is tried as a name-less operation.
pub fn resolve(method: &Method, route: &str) -> Result<ResolvedCall, GatewayError> {
    let route = route.trim_start_matches('/');

    let (operation, name) = match route.rsplit_once('/') {
        Some((head, tail)) => match Operation::lookup(head) {
            Some(op) => (op, Some(tail)),
            None => return Err(GatewayError::UnknownOperation(route.to_string())),
        },
        None => match Operation::lookup(route) {
            Some(op) => (op, None),
            None => return Err(GatewayError::UnknownOperation(route.to_string())),
        },
    };

    let name = name.filter(|n| !n.is_empty());
    if operation.takes_session_name() && name.is_none() {
        return Err(GatewayError::Validation(format!(
            "'{operation}' requires a session name in the path"
        )));
    }
    if !operation.takes_session_name() && name.is_some() {
        return Err(GatewayError::Validation(format!(
            "'{operation}' does not take a session name in the path"
        )));
    }

    if *method != operation.method() {
        return Err(GatewayError::MethodNotAllowed {
            method: method.to_string(),
            operation: operation.segment(),
        });
    }

    Ok(match name {
        Some(name) => ResolvedCall::Session {
            operation,
            name: name.to_string(),
        },
        None => ResolvedCall::Create,
    })
}

/// An inbound call, as received by the HTTP layer.
#[derive(Debug, Clone)]
pub struct ProxyCall {
    pub method: Method,
    /// Decoded path after `/instance/`, used for dispatch.
    pub route: String,
    /// Raw path and query, forwarded unchanged.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The proxy gateway.
#[derive(Clone)]
pub struct Gateway {
    nodes: Arc<dyn NodeStore>,
    sessions: Arc<dyn SessionStore>,
    client: NodeClient,
    placement: PlacementPolicy,
}

impl Gateway {
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        sessions: Arc<dyn SessionStore>,
        client: NodeClient,
        placement: PlacementPolicy,
    ) -> Self {
        Self {
            nodes,
            sessions,
            client,
            placement,
        }
    }

    /// Handle one inbound call end to end.
    pub async fn handle(&self, call: ProxyCall) -> Result<RelayedResponse, GatewayError> {
        match resolve(&call.method, &call.route)? {
            ResolvedCall::Create => self.create(call).await,
            ResolvedCall::Session { operation, name } => {
                self.forward_to_owner(operation, name, call).await
            }
        }
    }

    async fn create(&self, call: ProxyCall) -> Result<RelayedResponse, GatewayError> {
        let request: CreateInstanceRequest = serde_json::from_slice(&call.body)
            .map_err(|e| GatewayError::Validation(format!("invalid create body: {e}")))?;

        let name = request.instance_name;
        if name.trim().is_empty() {
            return Err(GatewayError::Validation("instanceName is required".to_string()));
        }
        if name.contains('/') {
            return Err(GatewayError::Validation(
                "instanceName cannot contain '/'".to_string(),
            ));
        }
        if request.token.trim().is_empty() {
            return Err(GatewayError::Validation("token is required".to_string()));
        }

        match self.sessions.find(SessionKey::ByName(name.clone())).await {
            Ok(_) => return Err(GatewayError::SessionExists(name)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let snapshot = self.sessions.load_snapshot().await?;
        let target = self.placement.place(&snapshot)?;

        let response = self
            .client
            .forward(
                &target.url,
                call.method,
                &call.path_and_query,
                &call.headers,
                call.body,
            )
            .await?;

        if !response.is_success() {
            return Ok(response);
        }

        let session = self
            .sessions
            .create(NewSession {
                name: name.clone(),
                status: SessionStatus::Connecting,
                node_id: target.node_id,
                apikey: request.token,
            })
            .await
            .map_err(|e| {
                error!(
                    session = %name,
                    node_id = %target.node_id,
                    error = %e,
                    "Node created the session but recording it failed"
                );
                // Never a client error here: the input was already accepted
                // and the session now exists on the node.
                GatewayError::Storage(e)
            })?;

        info!(
            session = %session.name,
            session_id = %session.id,
            node_id = %target.node_id,
            open_count = target.open_count,
            "Session created"
        );
        Ok(response)
    }

    async fn forward_to_owner(
        &self,
        operation: Operation,
        name: String,
        call: ProxyCall,
    ) -> Result<RelayedResponse, GatewayError> {
        let session = match self.sessions.find(SessionKey::ByName(name.clone())).await {
            Ok(session) => session,
            Err(e) if e.is_not_found() => return Err(GatewayError::SessionNotFound(name)),
            Err(e) => return Err(e.into()),
        };
        let node = self.nodes.get(session.node_id).await?;

        let response = self
            .client
            .forward(
                &node.url,
                call.method,
                &call.path_and_query,
                &call.headers,
                call.body,
            )
            .await?;

        if response.is_success() {
            self.record_outcome(operation, &session, &response).await;
        }
        Ok(response)
    }

    // The node has already acted; a failed local write is logged and left
    // for reconciliation rather than turned into a client error.
    async fn record_outcome(&self, operation: Operation, session: &Session, response: &RelayedResponse) {
        let key = SessionKey::ById(session.id);
        let result = match operation {
            Operation::Connect => self.sessions.set_status(key, SessionStatus::Open).await.map(|_| ()),
            Operation::Logout => self.sessions.set_status(key, SessionStatus::Close).await.map(|_| ()),
            Operation::ConnectionState => {
                match ConnectionStateReport::parse_state(&response.body)
                    .and_then(|state| state.parse::<SessionStatus>().ok())
                {
                    Some(status) if status != session.status => {
                        self.sessions.set_status(key, status).await.map(|_| ())
                    }
                    _ => Ok(()),
                }
            }
            Operation::Delete => self.sessions.delete(key).await.map(|_| ()),
            Operation::Create | Operation::Restart => Ok(()),
        };

        match result {
            Ok(()) => info!(session = %session.name, operation = %operation, "Session updated"),
            Err(e) => warn!(
                session = %session.name,
                operation = %operation,
                error = %e,
                "Failed to record session outcome"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, StoreError};
    use crate::model::{NewNode, Node, NodeId, NodeLoad, SessionFilter, SessionUpdate};
    use crate::provision::ProvisionQueue;
    use rstest::rstest;
    use std::time::Duration;
    use swarm_node_api::{NodeApiError, NodeClientConfig};
    use tokio::sync::mpsc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[rstest]
    #[case(Method::POST, "create", ResolvedCall::Create)]
    #[case(Method::POST, "create/", ResolvedCall::Create)]
    #[case(Method::GET, "connect/alice", ResolvedCall::Session { operation: Operation::Connect, name: "alice".into() })]
    #[case(Method::GET, "connectionState/alice", ResolvedCall::Session { operation: Operation::ConnectionState, name: "alice".into() })]
    #[case(Method::DELETE, "logout/alice", ResolvedCall::Session { operation: Operation::Logout, name: "alice".into() })]
    #[case(Method::DELETE, "delete/alice", ResolvedCall::Session { operation: Operation::Delete, name: "alice".into() })]
    #[case(Method::PUT, "restart/alice", ResolvedCall::Session { operation: Operation::Restart, name: "alice".into() })]
    fn test_resolve(#[case] method: Method, #[case] route: &str, #[case] expected: ResolvedCall) {
        assert_eq!(resolve(&method, route).unwrap(), expected);
    }

    #[rstest]
    #[case(Method::GET, "connect")]
    #[case(Method::GET, "connect/")]
    #[case(Method::DELETE, "delete")]
    #[case(Method::POST, "create/alice")]
    fn test_resolve_rejects_bad_name_segment(#[case] method: Method, #[case] route: &str) {
        assert!(matches!(
            resolve(&method, route),
            Err(GatewayError::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_unknown_and_wrong_verb() {
        assert!(matches!(
            resolve(&Method::GET, "teleport/alice"),
            Err(GatewayError::UnknownOperation(_))
        ));
        assert!(matches!(
            resolve(&Method::GET, "a/b/c"),
            Err(GatewayError::UnknownOperation(_))
        ));
        assert!(matches!(
            resolve(&Method::POST, "connect/alice"),
            Err(GatewayError::MethodNotAllowed { operation: "connect", .. })
        ));
    }

    struct Harness {
        store: MemoryStore,
        gateway: Gateway,
        provision_rx: mpsc::UnboundedReceiver<crate::provision::ProvisionRequest>,
    }

    fn harness(threshold: i64) -> Harness {
        let store = MemoryStore::new();
        let (queue, provision_rx) = ProvisionQueue::new();
        let client = NodeClient::new(&NodeClientConfig {
            api_key: "node-secret".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        let gateway = Gateway::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            client,
            PlacementPolicy::new(threshold, queue),
        );
        Harness {
            store,
            gateway,
            provision_rx,
        }
    }

    async fn add_node(store: &MemoryStore, name: &str, url: &str, open: usize) -> Node {
        let node = NodeStore::create(
            store,
            NewNode {
                name: name.to_string(),
                ip: "10.0.0.1".to_string(),
                url: url.to_string(),
                active: true,
                capacity: None,
            },
        )
        .await
        .unwrap();
        for i in 0..open {
            SessionStore::create(
                store,
                NewSession {
                    name: format!("{name}-open-{i}"),
                    status: SessionStatus::Open,
                    node_id: node.id,
                    apikey: format!("{name}-tok-{i}"),
                },
            )
            .await
            .unwrap();
        }
        node
    }

    fn create_call(name: &str, token: &str) -> ProxyCall {
        ProxyCall {
            method: Method::POST,
            route: "create".to_string(),
            path_and_query: "/instance/create".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::from(
                serde_json::json!({"instanceName": name, "token": token, "qrcode": true}).to_string(),
            ),
        }
    }

    fn session_call(method: Method, op: &str, name: &str) -> ProxyCall {
        ProxyCall {
            method,
            route: format!("{op}/{name}"),
            path_and_query: format!("/instance/{op}/{name}"),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    async fn open_count(store: &MemoryStore, node_id: NodeId) -> i64 {
        store
            .load_snapshot()
            .await
            .unwrap()
            .into_iter()
            .find(|l| l.node_id == node_id)
            .map(|l| l.open_count)
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_places_on_least_loaded_node() {
        let node_a = MockServer::start().await;
        let node_b = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instance/create"))
            .and(header("apikey", "node-secret"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"instance": {"instanceName": "alice"}})))
            .expect(1)
            .mount(&node_b)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&node_a)
            .await;

        let h = harness(5);
        add_node(&h.store, "a", &node_a.uri(), 3).await;
        let b = add_node(&h.store, "b", &node_b.uri(), 1).await;

        let response = h.gateway.handle(create_call("alice", "tok-alice")).await.unwrap();
        assert_eq!(response.status.as_u16(), 201);

        // Resolving by name returns the node placement chose.
        let session = h
            .store
            .find(SessionKey::ByName("alice".to_string()))
            .await
            .unwrap();
        assert_eq!(session.node_id, b.id);
        assert_eq!(session.status, SessionStatus::Connecting);
        assert_eq!(session.apikey, "tok-alice");
    }

    #[tokio::test]
    async fn test_create_on_saturated_fleet_triggers_provisioning() {
        let node_a = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&node_a)
            .await;

        let mut h = harness(5);
        add_node(&h.store, "a", &node_a.uri(), 5).await;
        add_node(&h.store, "b", "http://127.0.0.1:1", 5).await;

        let err = h.gateway.handle(create_call("alice", "tok")).await.unwrap_err();
        assert!(matches!(err, GatewayError::CapacityExhausted(_)));

        assert!(h.provision_rx.try_recv().is_ok());
        assert!(h.provision_rx.try_recv().is_err());
        assert!(h
            .store
            .find(SessionKey::ByName("alice".to_string()))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_create_without_nodes() {
        let mut h = harness(5);
        let err = h.gateway.handle(create_call("alice", "tok")).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoNodesAvailable));
        assert!(h.provision_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remote_failure_on_create_is_relayed_and_not_recorded() {
        let node = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instance/create"))
            .respond_with(ResponseTemplate::new(500).set_body_string("node exploded"))
            .mount(&node)
            .await;

        let h = harness(5);
        add_node(&h.store, "a", &node.uri(), 0).await;

        let response = h.gateway.handle(create_call("alice", "tok")).await.unwrap();
        assert_eq!(response.status.as_u16(), 500);
        assert_eq!(response.body.as_ref(), b"node exploded");
        assert!(SessionStore::list(&h.store, SessionFilter::All)
            .await
            .unwrap()
            .is_empty());
    }

    /// Session directory that lost the race with an operator deactivating
    /// the chosen node: every insert is refused.
    struct RefusingSessions(MemoryStore);

    #[async_trait::async_trait]
    impl SessionStore for RefusingSessions {
        async fn find(&self, key: SessionKey) -> Result<Session, StoreError> {
            self.0.find(key).await
        }

        async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
            SessionStore::list(&self.0, filter).await
        }

        async fn create(&self, session: NewSession) -> Result<Session, StoreError> {
            Err(StoreError::Validation(format!(
                "node {} does not exist or is inactive",
                session.node_id
            )))
        }

        async fn update(&self, key: SessionKey, update: SessionUpdate) -> Result<Session, StoreError> {
            SessionStore::update(&self.0, key, update).await
        }

        async fn delete(&self, key: SessionKey) -> Result<Session, StoreError> {
            self.0.delete(key).await
        }

        async fn delete_for_node(&self, node_id: NodeId) -> Result<u64, StoreError> {
            self.0.delete_for_node(node_id).await
        }

        async fn load_snapshot(&self) -> Result<Vec<NodeLoad>, StoreError> {
            self.0.load_snapshot().await
        }
    }

    #[tokio::test]
    async fn test_create_recorded_after_remote_success_failing_is_internal() {
        let node = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instance/create"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&node)
            .await;

        let store = MemoryStore::new();
        add_node(&store, "a", &node.uri(), 0).await;
        let (queue, _provision_rx) = ProvisionQueue::new();
        let client = NodeClient::new(&NodeClientConfig {
            api_key: "node-secret".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        let gateway = Gateway::new(
            Arc::new(store.clone()),
            Arc::new(RefusingSessions(store.clone())),
            client,
            PlacementPolicy::new(5, queue),
        );

        let err = gateway.handle(create_call("alice", "tok")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Storage(StoreError::Validation(_))));
        let api = crate::api::error::ApiError::from(err);
        assert_eq!(api.status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_body_and_duplicates() {
        let node = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&node)
            .await;

        let h = harness(5);
        add_node(&h.store, "a", &node.uri(), 1).await;

        let err = h.gateway.handle(create_call("", "tok")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));

        let err = h.gateway.handle(create_call("bob", "")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));

        let err = h.gateway.handle(create_call("a-open-0", "tok")).await.unwrap_err();
        assert!(matches!(err, GatewayError::SessionExists(_)));
    }

    #[tokio::test]
    async fn test_connect_unknown_session_makes_no_remote_call() {
        let node = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&node)
            .await;

        let h = harness(5);
        add_node(&h.store, "a", &node.uri(), 0).await;

        let err = h
            .gateway
            .handle(session_call(Method::GET, "connect", "ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::SessionNotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_connect_and_logout_update_status() {
        let node = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instance/connect/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"base64": "qr"})))
            .expect(1)
            .mount(&node)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/instance/logout/alice"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&node)
            .await;

        let h = harness(5);
        let a = add_node(&h.store, "a", &node.uri(), 0).await;
        SessionStore::create(
            &h.store,
            NewSession {
                name: "alice".to_string(),
                status: SessionStatus::Connecting,
                node_id: a.id,
                apikey: "tok-alice".to_string(),
            },
        )
        .await
        .unwrap();

        let response = h
            .gateway
            .handle(session_call(Method::GET, "connect", "alice"))
            .await
            .unwrap();
        assert_eq!(response.body.as_ref(), br#"{"base64":"qr"}"#);
        assert_eq!(open_count(&h.store, a.id).await, 1);

        h.gateway
            .handle(session_call(Method::DELETE, "logout", "alice"))
            .await
            .unwrap();
        let session = h
            .store
            .find(SessionKey::ByName("alice".to_string()))
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Close);
        assert_eq!(open_count(&h.store, a.id).await, 0);
    }

    #[tokio::test]
    async fn test_connection_state_mirrors_reported_state() {
        let node = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instance/connectionState/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"instance": {"instanceName": "alice", "state": "open"}}),
            ))
            .mount(&node)
            .await;

        let h = harness(5);
        let a = add_node(&h.store, "a", &node.uri(), 0).await;
        SessionStore::create(
            &h.store,
            NewSession {
                name: "alice".to_string(),
                status: SessionStatus::Connecting,
                node_id: a.id,
                apikey: "tok-alice".to_string(),
            },
        )
        .await
        .unwrap();

        h.gateway
            .handle(session_call(Method::GET, "connectionState", "alice"))
            .await
            .unwrap();
        assert_eq!(open_count(&h.store, a.id).await, 1);
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let node = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/instance/delete/a-open-0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&node)
            .await;

        let h = harness(5);
        let a = add_node(&h.store, "a", &node.uri(), 2).await;

        h.gateway
            .handle(session_call(Method::DELETE, "delete", "a-open-0"))
            .await
            .unwrap();
        assert_eq!(open_count(&h.store, a.id).await, 1);

        let err = h
            .gateway
            .handle(session_call(Method::DELETE, "delete", "a-open-0"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::SessionNotFound(_)));
        assert_eq!(open_count(&h.store, a.id).await, 1);
    }

    #[tokio::test]
    async fn test_unreachable_node_leaves_state_unchanged() {
        let h = harness(5);
        let a = add_node(&h.store, "a", "http://127.0.0.1:1", 1).await;

        let err = h
            .gateway
            .handle(session_call(Method::DELETE, "delete", "a-open-0"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Upstream(NodeApiError::Unreachable { .. })
        ));
        assert_eq!(open_count(&h.store, a.id).await, 1);
    }

    #[tokio::test]
    async fn test_remote_error_on_logout_keeps_status() {
        let node = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("instance not found"))
            .mount(&node)
            .await;

        let h = harness(5);
        let a = add_node(&h.store, "a", &node.uri(), 1).await;

        let response = h
            .gateway
            .handle(session_call(Method::DELETE, "logout", "a-open-0"))
            .await
            .unwrap();
        assert_eq!(response.status.as_u16(), 404);
        assert_eq!(open_count(&h.store, a.id).await, 1);
    }
}
