//! Node and Session records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! define_row_id {
    ($name:ident) => {
        /// Store-assigned row identifier.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

define_row_id!(NodeId);
define_row_id!(SessionId);

/// A backend host running the session service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub ip: String,
    /// Public base URL, e.g. `https://eapi20240101120000.example.com`.
    pub url: String,
    pub active: bool,
    /// Operator-recorded soft capacity. Informational only.
    pub capacity: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Fields for registering a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub name: String,
    pub ip: String,
    pub url: String,
    pub active: bool,
    pub capacity: Option<i32>,
}

/// Partial update of a node's mutable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub capacity: Option<i32>,
}

impl NodeUpdate {
    pub fn apply(&self, node: &mut Node) {
        if let Some(name) = self.name.as_ref().filter(|s| !s.is_empty()) {
            node.name = name.clone();
        }
        if let Some(ip) = self.ip.as_ref().filter(|s| !s.is_empty()) {
            node.ip = ip.clone();
        }
        if let Some(url) = self.url.as_ref().filter(|s| !s.is_empty()) {
            node.url = url.clone();
        }
        if let Some(active) = self.active {
            node.active = active;
        }
        if let Some(capacity) = self.capacity {
            node.capacity = Some(capacity);
        }
    }
}

/// Last known remote state of a session.
///
/// Advisory only: the node owns the authoritative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Connecting,
    Open,
    Close,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for SessionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "connecting" => Ok(Self::Connecting),
            "open" => Ok(Self::Open),
            "close" | "closed" => Ok(Self::Close),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A named client session bound to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub status: SessionStatus,
    pub node_id: NodeId,
    /// Client token; the only key shared with the node.
    pub apikey: String,
    pub updated_at: DateTime<Utc>,
}

/// Fields for recording a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub name: String,
    pub status: SessionStatus,
    pub node_id: NodeId,
    pub apikey: String,
}

/// Partial update of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

impl SessionUpdate {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            name: None,
            status: Some(status),
        }
    }
}

/// Typed lookup key for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKey {
    ById(SessionId),
    ByName(String),
    ByCredential(String),
}

impl SessionKey {
    pub fn matches(&self, session: &Session) -> bool {
        match self {
            Self::ById(id) => session.id == *id,
            Self::ByName(name) => session.name == *name,
            Self::ByCredential(apikey) => session.apikey == *apikey,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ById(id) => write!(f, "id={id}"),
            Self::ByName(name) => write!(f, "name={name}"),
            // Never print credentials.
            Self::ByCredential(_) => write!(f, "credential=<redacted>"),
        }
    }
}

/// Session listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFilter {
    All,
    ByNode(NodeId),
}

/// One row of the load snapshot: an active node and its open-session count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeLoad {
    pub node_id: NodeId,
    pub name: String,
    pub url: String,
    pub open_count: i64,
}
