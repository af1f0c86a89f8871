//! Placement of new sessions onto nodes.
//!
//! The policy reads the load snapshot (active nodes with their open-session
//! counts) and picks the least loaded node strictly below the capacity
//! threshold. Ties go to the node encountered first in snapshot order, so
//! the decision is deterministic for a given snapshot.
//!
//! When every node is at or above the threshold the fleet is saturated: the
//! request fails with `CapacityExhausted` and exactly one provisioning
//! request is submitted to the provisioning queue. The caller never waits
//! for provisioning.
//!
//! The snapshot is read outside any transaction spanning the remote create,
//! so concurrent creates can push a node past the threshold. Capacity is
//! soft.

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::NodeLoad;
use crate::provision::{ProvisionQueue, ProvisionRequest};

/// Why no node could be chosen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// The snapshot contained no active nodes.
    #[error("no nodes available")]
    NoNodesAvailable,

    /// Every node is at or above the threshold.
    #[error("all {nodes} nodes at or above threshold {threshold}")]
    Saturated { nodes: usize, threshold: i64 },
}

/// Pick the target node from a snapshot. Pure: never writes state.
pub fn choose_node(snapshot: &[NodeLoad], threshold: i64) -> Result<&NodeLoad, PlacementError> {
    if snapshot.is_empty() {
        return Err(PlacementError::NoNodesAvailable);
    }

    let mut best: Option<&NodeLoad> = None;
    for load in snapshot.iter().filter(|l| l.open_count < threshold) {
        // Strict comparison keeps the first node seen on ties.
        if best.is_none_or(|b| load.open_count < b.open_count) {
            best = Some(load);
        }
    }

    best.ok_or(PlacementError::Saturated {
        nodes: snapshot.len(),
        threshold,
    })
}

/// Placement policy with its saturation side effect.
#[derive(Clone)]
pub struct PlacementPolicy {
    threshold: i64,
    queue: ProvisionQueue,
}

impl PlacementPolicy {
    pub fn new(threshold: i64, queue: ProvisionQueue) -> Self {
        Self { threshold, queue }
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Choose a node, triggering provisioning once on saturation.
    pub fn place(&self, snapshot: &[NodeLoad]) -> Result<NodeLoad, PlacementError> {
        match choose_node(snapshot, self.threshold) {
            Ok(load) => {
                debug!(
                    node_id = %load.node_id,
                    open_count = load.open_count,
                    threshold = self.threshold,
                    "Placed session"
                );
                Ok(load.clone())
            }
            Err(err @ PlacementError::Saturated { nodes, threshold }) => {
                warn!(nodes, threshold, "Fleet saturated, requesting a new node");
                self.queue.submit(ProvisionRequest::saturated(nodes, threshold));
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}
