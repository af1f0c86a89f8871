//! Client for the session service running on every fleet node.
//!
//! Each node exposes the same `/instance/...` HTTP surface. The gateway uses
//! this crate for two things:
//!
//! - Relaying client calls to the node that owns a session (`forward`)
//! - Polling a node's live session list during reconciliation
//!   (`fetch_instances`)
//!
//! All calls are authenticated with a single static header credential and
//! carry a bounded timeout.

mod client;
mod error;
mod types;

pub use client::{NodeClient, NodeClientConfig, RelayedResponse};
pub use error::NodeApiError;
pub use types::{ConnectionStateReport, CreateInstanceRequest, ReportedInstance};

/// Default header carrying the node service credential.
pub const DEFAULT_API_KEY_HEADER: &str = "apikey";

/// Path polled for a node's live session list.
pub const FETCH_INSTANCES_PATH: &str = "/instance/fetchInstances";
