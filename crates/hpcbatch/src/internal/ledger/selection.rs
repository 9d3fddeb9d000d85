use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::internal::common::ids::NodeId;

/// Picks which of the feasible nodes a job lands on.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum HostSelection {
    /// Lowest node ids first
    #[default]
    #[serde(rename = "FIRSTFIT")]
    FirstFit,
    /// Nodes left with the fewest free cores first
    #[serde(rename = "BESTFIT")]
    BestFit,
    /// Lowest ids starting from a cursor that moves past the last used node
    #[serde(rename = "ROUNDROBIN")]
    RoundRobin,
}

impl FromStr for HostSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIRSTFIT" => Ok(HostSelection::FirstFit),
            "BESTFIT" => Ok(HostSelection::BestFit),
            "ROUNDROBIN" => Ok(HostSelection::RoundRobin),
            _ => Err(format!("Unknown host selection algorithm '{s}'")),
        }
    }
}

/// How many cores of a selected node a job commits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoreAllocation {
    /// Exactly the requested cores per node, nodes may be shared.
    Requested,
    /// Every core and all memory of the node, the job is node-exclusive.
    WholeNode,
}

impl FromStr for CoreAllocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(CoreAllocation::Requested),
            "whole_node" => Ok(CoreAllocation::WholeNode),
            _ => Err(format!("Unknown core allocation '{s}'")),
        }
    }
}

/// A node that can host the job over the whole window, with the cores that would stay free.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub node_id: NodeId,
    pub residual_cores: u32,
}

impl HostSelection {
    /// Chooses `count` nodes from `candidates` (sorted by node id).
    /// Returns `None` when there are not enough candidates.
    pub(crate) fn select(
        &self,
        mut candidates: Vec<Candidate>,
        count: usize,
        cursor: NodeId,
    ) -> Option<Vec<NodeId>> {
        if candidates.len() < count {
            return None;
        }
        match self {
            HostSelection::FirstFit => {}
            HostSelection::BestFit => {
                candidates.sort_by_key(|c| (c.residual_cores, c.node_id));
            }
            HostSelection::RoundRobin => {
                let split = candidates.partition_point(|c| c.node_id < cursor);
                candidates.rotate_left(split);
            }
        }
        let mut nodes: Vec<NodeId> = candidates[..count].iter().map(|c| c.node_id).collect();
        nodes.sort();
        Some(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::{Candidate, HostSelection};
    use crate::internal::common::ids::NodeId;

    fn candidates(residuals: &[u32]) -> Vec<Candidate> {
        residuals
            .iter()
            .enumerate()
            .map(|(i, r)| Candidate {
                node_id: NodeId::new(i as u32),
                residual_cores: *r,
            })
            .collect()
    }

    fn ids(nodes: Option<Vec<NodeId>>) -> Vec<u32> {
        nodes.unwrap().into_iter().map(|n| n.as_num()).collect()
    }

    #[test]
    fn test_first_fit() {
        let s = HostSelection::FirstFit;
        assert_eq!(ids(s.select(candidates(&[5, 0, 3]), 2, NodeId::new(0))), vec![0, 1]);
        assert!(s.select(candidates(&[5]), 2, NodeId::new(0)).is_none());
    }

    #[test]
    fn test_best_fit_prefers_tight_nodes() {
        let s = HostSelection::BestFit;
        assert_eq!(ids(s.select(candidates(&[5, 0, 3, 0]), 2, NodeId::new(0))), vec![1, 3]);
        assert_eq!(ids(s.select(candidates(&[5, 1, 3, 2]), 1, NodeId::new(0))), vec![1]);
    }

    #[test]
    fn test_round_robin_wraps() {
        let s = HostSelection::RoundRobin;
        assert_eq!(ids(s.select(candidates(&[0, 0, 0, 0]), 2, NodeId::new(3))), vec![0, 3]);
        assert_eq!(ids(s.select(candidates(&[0, 0, 0, 0]), 1, NodeId::new(2))), vec![2]);
    }
}
