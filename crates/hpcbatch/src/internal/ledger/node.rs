use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::internal::common::ids::NodeId;

/// A multi-core compute node of the cluster. Immutable after the service starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComputeNode {
    pub name: String,
    pub cores: u32,
    /// Bytes
    pub memory: u64,
}

impl ComputeNode {
    pub fn new(name: impl Into<String>, cores: u32, memory: u64) -> Self {
        ComputeNode {
            name: name.into(),
            cores,
            memory,
        }
    }
}

/// Shape of a job as seen by the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRequest {
    pub n_nodes: u32,
    pub cores_per_node: u32,
    /// When not set, the job gets the share of node memory proportional to its cores.
    pub memory_per_node: Option<u64>,
}

impl ResourceRequest {
    pub fn new(n_nodes: u32, cores_per_node: u32) -> Self {
        ResourceRequest {
            n_nodes,
            cores_per_node,
            memory_per_node: None,
        }
    }
}

/// Cores and memory committed to one job on one node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeAllocation {
    pub node_id: NodeId,
    pub cores: u32,
    pub memory: u64,
}

pub type NodeSet = SmallVec<[NodeAllocation; 4]>;
