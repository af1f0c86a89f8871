//! Storage layer for the gateway.
//!
//! This module provides:
//! - The Node Registry (`NodeStore`) and Session Directory (`SessionStore`)
//!   seams used by every component
//! - A Postgres implementation over a SQLx connection pool
//! - An in-memory implementation for tests and local runs
//!
//! Components receive store handles at construction; there is no global
//! database handle.

mod error;
mod memory;
mod postgres;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::{PgNodeStore, PgSessionStore};

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::model::{
    NewNode, NewSession, Node, NodeId, NodeLoad, NodeUpdate, Session, SessionFilter, SessionKey,
    SessionStatus, SessionUpdate,
};

/// Node Registry.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// All nodes, ordered by id.
    async fn list(&self) -> Result<Vec<Node>, StoreError>;

    async fn get(&self, id: NodeId) -> Result<Node, StoreError>;

    async fn create(&self, node: NewNode) -> Result<Node, StoreError>;

    async fn update(&self, id: NodeId, update: NodeUpdate) -> Result<Node, StoreError>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Session Directory.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find(&self, key: SessionKey) -> Result<Session, StoreError>;

    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError>;

    /// Record a new session. Names must be non-empty and unique, and the
    /// owning node must exist and be active.
    async fn create(&self, session: NewSession) -> Result<Session, StoreError>;

    /// Read-modify-write of the first matching session.
    async fn update(&self, key: SessionKey, update: SessionUpdate) -> Result<Session, StoreError>;

    async fn delete(&self, key: SessionKey) -> Result<Session, StoreError>;

    /// Remove every session bound to a node. Returns the number removed.
    async fn delete_for_node(&self, node_id: NodeId) -> Result<u64, StoreError>;

    /// Active nodes with their open-session counts, most loaded first, ties
    /// by ascending node id. Nodes without open sessions are included.
    async fn load_snapshot(&self) -> Result<Vec<NodeLoad>, StoreError>;

    async fn set_status(
        &self,
        key: SessionKey,
        status: SessionStatus,
    ) -> Result<Session, StoreError> {
        self.update(key, SessionUpdate::status(status)).await
    }
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,

    /// Idle connection timeout.
    pub idle_timeout: Duration,

    /// Maximum lifetime of a connection.
    pub max_lifetime: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/swarm".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/swarm".to_string());

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Self {
            database_url,
            max_connections,
            min_connections,
            ..Default::default()
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect(&config.database_url)
            .await
            .map_err(StoreError::Connect)?;

        info!("Database connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the first migrations directory found.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");

        let candidates = vec![
            std::path::PathBuf::from("./migrations"),
            std::path::PathBuf::from("services/gateway/migrations"),
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator
                        .run(&self.pool)
                        .await
                        .map_err(StoreError::Migration)?;
                    info!("Database migrations complete");
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(StoreError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Get a node registry handle.
    pub fn node_store(&self) -> PgNodeStore {
        PgNodeStore::new(self.pool.clone())
    }

    /// Get a session directory handle.
    pub fn session_store(&self) -> PgSessionStore {
        PgSessionStore::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }
}
