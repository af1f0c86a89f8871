//! Session fleet gateway.
//!
//! Serves the session proxy and operator API, and drives provisioning and
//! status reconciliation in the background.

use std::sync::Arc;

use anyhow::Result;
use swarm_gateway::{
    api, bootstrap,
    config::{self, StoreKind},
    db::{Database, MemoryStore, NodeStore, SessionStore},
    gateway::Gateway,
    placement::PlacementPolicy,
    provision::{
        CloudflareDns, HetznerCompute, ProvisionQueue, ProvisionWorker, Provisioner,
        ScriptDeployer,
    },
    reconcile::{ReconcileWorker, Reconciler},
    state::AppState,
};
use swarm_node_api::NodeClient;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to SWARM_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting session gateway");
    info!(
        listen_addr = %config.listen_addr,
        store = ?config.store,
        session_threshold = config.session_threshold,
        "Configuration loaded"
    );

    if config.node_client.api_key.is_empty() {
        warn!("SWARM_NODE_API_KEY is not set; nodes will reject forwarded calls");
    }

    let nodes: Arc<dyn NodeStore>;
    let sessions: Arc<dyn SessionStore>;
    match config.store {
        StoreKind::Postgres => {
            let db = match Database::connect(&config.database).await {
                Ok(db) => db,
                Err(e) => {
                    error!(error = %e, "Failed to connect to database");
                    return Err(e.into());
                }
            };

            if config.dev_mode {
                info!("Running database migrations (dev mode)");
                if let Err(e) = db.run_migrations().await {
                    error!(error = %e, "Failed to run migrations");
                    return Err(e.into());
                }
            }

            nodes = Arc::new(db.node_store());
            sessions = Arc::new(db.session_store());
        }
        StoreKind::Memory => {
            warn!("Using in-memory store; state is lost on restart");
            let store = MemoryStore::new();
            nodes = Arc::new(store.clone());
            sessions = Arc::new(store);
        }
    }

    if let Some(node) = &config.bootstrap_node {
        bootstrap::ensure_default_node(nodes.as_ref(), node).await?;
    }

    let client = NodeClient::new(&config.node_client)?;

    let provisioner = Arc::new(Provisioner::new(
        nodes.clone(),
        Arc::new(HetznerCompute::new(&config.compute)?),
        Arc::new(CloudflareDns::new(&config.dns)?),
        Arc::new(ScriptDeployer::new(config.deploy.clone())),
        config.provision.clone(),
    ));

    let (queue, provision_rx) = ProvisionQueue::new();
    let placement = PlacementPolicy::new(config.session_threshold, queue);
    let gateway = Gateway::new(nodes.clone(), sessions.clone(), client.clone(), placement);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let provision_worker = ProvisionWorker::new(provisioner.clone(), provision_rx);
    let provision_handle = tokio::spawn(provision_worker.run(shutdown_rx.clone()));

    let reconcile_worker = ReconcileWorker::new(
        Reconciler::new(nodes.clone(), sessions.clone(), client),
        config.reconcile_interval,
    );
    let reconcile_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            reconcile_worker.run(shutdown_rx).await;
        }
    });

    let state = AppState::new(nodes, sessions, gateway, provisioner);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);

    if let Err(e) = tokio::time::timeout(shutdown_timeout, provision_handle).await {
        warn!(error = %e, "Provisioning worker did not shut down in time");
    }

    if let Err(e) = tokio::time::timeout(shutdown_timeout, reconcile_handle).await {
        warn!(error = %e, "Reconcile worker did not shut down in time");
    }

    info!("Gateway shutdown complete");
    Ok(())
}
