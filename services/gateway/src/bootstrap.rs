//! First-start seeding of the node registry.

use tracing::info;

use crate::config::BootstrapNode;
use crate::db::{NodeStore, StoreError};
use crate::model::{NewNode, Node};

/// Register the configured default node if the registry is empty.
///
/// Returns the created node, or `None` when nodes already exist.
pub async fn ensure_default_node(
    nodes: &dyn NodeStore,
    bootstrap: &BootstrapNode,
) -> Result<Option<Node>, StoreError> {
    if !nodes.list().await?.is_empty() {
        return Ok(None);
    }

    let node = nodes
        .create(NewNode {
            name: bootstrap.name.clone(),
            ip: bootstrap.ip.clone(),
            url: bootstrap.url.clone(),
            active: true,
            capacity: None,
        })
        .await?;

    info!(node_id = %node.id, url = %node.url, "Registered bootstrap node");
    Ok(Some(node))
}
