//! Postgres-backed node registry and session directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres, Row};
use tracing::debug;

use super::{NodeStore, SessionStore, StoreError};
use crate::model::{
    NewNode, NewSession, Node, NodeId, NodeLoad, NodeUpdate, Session, SessionFilter, SessionId,
    SessionKey, SessionStatus, SessionUpdate,
};

const NODE_COLUMNS: &str = "id, name, ip, url, active, capacity, created_at";
const SESSION_COLUMNS: &str = "id, name, status, node_id, apikey, updated_at";

/// Node registry over the `nodes` table.
#[derive(Clone)]
pub struct PgNodeStore {
    pool: PgPool,
}

impl PgNodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NodeStore for PgNodeStore {
    async fn list(&self) -> Result<Vec<Node>, StoreError> {
        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(rows.into_iter().map(Node::from).collect())
    }

    async fn get(&self, id: NodeId) -> Result<Node, StoreError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        row.map(Node::from)
            .ok_or_else(|| StoreError::not_found("node", id))
    }

    async fn create(&self, node: NewNode) -> Result<Node, StoreError> {
        validate_node(&node.name, &node.url)?;

        let row = sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            INSERT INTO nodes (name, ip, url, active, capacity, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            RETURNING {NODE_COLUMNS}
            "#
        ))
        .bind(&node.name)
        .bind(&node.ip)
        .bind(&node.url)
        .bind(node.active)
        .bind(node.capacity)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        debug!(node_id = row.id, name = %row.name, "Node registered");
        Ok(Node::from(row))
    }

    async fn update(&self, id: NodeId, update: NodeUpdate) -> Result<Node, StoreError> {
        let mut node = self.get(id).await?;
        update.apply(&mut node);

        let row = sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            UPDATE nodes
            SET name = $2, ip = $3, url = $4, active = $5, capacity = $6
            WHERE id = $1
            RETURNING {NODE_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(&node.name)
        .bind(&node.ip)
        .bind(&node.url)
        .bind(node.active)
        .bind(node.capacity)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?;

        row.map(Node::from)
            .ok_or_else(|| StoreError::not_found("node", id))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }
}

/// Session directory over the `sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find(&self, key: SessionKey) -> Result<Session, StoreError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE {} = $1 ORDER BY id ASC LIMIT 1",
            key_column(&key)
        );
        let row = bind_key(sqlx::query_as::<_, SessionRow>(&sql), &key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        row.map(Session::from)
            .ok_or_else(|| StoreError::not_found("session", &key))
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
        let rows = match filter {
            SessionFilter::All => {
                sqlx::query_as::<_, SessionRow>(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY id ASC"
                ))
                .fetch_all(&self.pool)
                .await
            }
            SessionFilter::ByNode(node_id) => {
                sqlx::query_as::<_, SessionRow>(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE node_id = $1 ORDER BY id ASC"
                ))
                .bind(node_id.get())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(StoreError::Query)?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn create(&self, session: NewSession) -> Result<Session, StoreError> {
        if session.name.trim().is_empty() {
            return Err(StoreError::Validation(
                "session name cannot be empty".to_string(),
            ));
        }

        // Only binds to an existing, active node.
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            INSERT INTO sessions (name, status, node_id, apikey, updated_at)
            SELECT $1, $2, n.id, $4, now()
            FROM nodes n
            WHERE n.id = $3 AND n.active
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(&session.name)
        .bind(session.status.as_str())
        .bind(session.node_id.get())
        .bind(&session.apikey)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?;

        match row {
            Some(row) => Ok(Session::from(row)),
            None => Err(StoreError::Validation(format!(
                "node {} does not exist or is inactive",
                session.node_id
            ))),
        }
    }

    async fn update(&self, key: SessionKey, update: SessionUpdate) -> Result<Session, StoreError> {
        let current = self.find(key).await?;

        let name = update
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(current.name);
        let status = update.status.unwrap_or(current.status);

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            UPDATE sessions
            SET name = $2, status = $3, updated_at = now()
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(current.id.get())
        .bind(&name)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?;

        // A concurrent delete between the read and the write.
        row.map(Session::from)
            .ok_or_else(|| StoreError::not_found("session", current.id))
    }

    async fn delete(&self, key: SessionKey) -> Result<Session, StoreError> {
        let sql = format!(
            r#"
            DELETE FROM sessions
            WHERE id = (SELECT id FROM sessions WHERE {} = $1 ORDER BY id ASC LIMIT 1)
            RETURNING {SESSION_COLUMNS}
            "#,
            key_column(&key)
        );
        let row = bind_key(sqlx::query_as::<_, SessionRow>(&sql), &key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        row.map(Session::from)
            .ok_or_else(|| StoreError::not_found("session", &key))
    }

    async fn delete_for_node(&self, node_id: NodeId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE node_id = $1")
            .bind(node_id.get())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        Ok(result.rows_affected())
    }

    async fn load_snapshot(&self) -> Result<Vec<NodeLoad>, StoreError> {
        let rows = sqlx::query_as::<_, NodeLoadRow>(
            r#"
            SELECT n.id, n.name, n.url, COUNT(s.id) AS open_count
            FROM nodes n
            LEFT JOIN sessions s ON s.node_id = n.id AND s.status = 'open'
            WHERE n.active
            GROUP BY n.id, n.name, n.url
            ORDER BY open_count DESC, n.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(rows
            .into_iter()
            .map(|r| NodeLoad {
                node_id: NodeId(r.id),
                name: r.name,
                url: r.url,
                open_count: r.open_count,
            })
            .collect())
    }
}

fn validate_node(name: &str, url: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("node name cannot be empty".to_string()));
    }
    if url.trim().is_empty() {
        return Err(StoreError::Validation("node url cannot be empty".to_string()));
    }
    Ok(())
}

// Column names come from the key variant, never from input.
fn key_column(key: &SessionKey) -> &'static str {
    match key {
        SessionKey::ById(_) => "id",
        SessionKey::ByName(_) => "name",
        SessionKey::ByCredential(_) => "apikey",
    }
}

fn bind_key<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    key: &'q SessionKey,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    match key {
        SessionKey::ById(id) => query.bind(id.get()),
        SessionKey::ByName(name) => query.bind(name.as_str()),
        SessionKey::ByCredential(apikey) => query.bind(apikey.as_str()),
    }
}

fn write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        let constraint = db.constraint().unwrap_or("constraint").to_string();
        if db.is_unique_violation() {
            return StoreError::Validation(format!("duplicate value violates {constraint}"));
        }
        if db.is_foreign_key_violation() || db.is_check_violation() {
            return StoreError::Validation(format!("value violates {constraint}"));
        }
    }
    StoreError::Query(e)
}

// =============================================================================
// Rows
// =============================================================================

struct NodeRow {
    id: i64,
    name: String,
    ip: String,
    url: String,
    active: bool,
    capacity: Option<i32>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for NodeRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            ip: row.try_get("ip")?,
            url: row.try_get("url")?,
            active: row.try_get("active")?,
            capacity: row.try_get("capacity")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        Self {
            id: NodeId(row.id),
            name: row.name,
            ip: row.ip,
            url: row.url,
            active: row.active,
            capacity: row.capacity,
            created_at: row.created_at,
        }
    }
}

struct SessionRow {
    id: i64,
    name: String,
    status: SessionStatus,
    node_id: i64,
    apikey: String,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for SessionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<SessionStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            status,
            node_id: row.try_get("node_id")?,
            apikey: row.try_get("apikey")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: SessionId(row.id),
            name: row.name,
            status: row.status,
            node_id: NodeId(row.node_id),
            apikey: row.apikey,
            updated_at: row.updated_at,
        }
    }
}

struct NodeLoadRow {
    id: i64,
    name: String,
    url: String,
    open_count: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for NodeLoadRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            open_count: row.try_get("open_count")?,
        })
    }
}
