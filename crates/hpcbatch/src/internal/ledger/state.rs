use std::time::Duration;

use thiserror::Error;

use crate::internal::common::Map;
use crate::internal::common::ids::{JobId, NodeId};
use crate::internal::common::index::IndexVec;
use crate::internal::common::time::SimTime;
use crate::internal::ledger::node::{ComputeNode, NodeAllocation, NodeSet, ResourceRequest};
use crate::internal::ledger::selection::{Candidate, CoreAllocation, HostSelection};
use crate::internal::ledger::timeline::{Commitment, NodeTimeline};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Job {job_id} would overcommit node {node_id}")]
    Overlap { job_id: JobId, node_id: NodeId },
    #[error("Job {0} already holds resources")]
    AlreadyCommitted(JobId),
    #[error("Not enough resources for the job")]
    Insufficient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitmentKind {
    /// The job is running on the nodes.
    Allocation,
    /// The job is queued and holds a future slot.
    Reservation,
}

#[derive(Debug, Clone)]
pub struct JobCommitment {
    pub kind: CommitmentKind,
    pub nodes: NodeSet,
    pub start: SimTime,
    pub finish: SimTime,
}

/// Authoritative record of node usage: current allocations and future reservations.
///
/// The ledger never starts or stops jobs, it only answers placement questions and
/// records the commitments it is told about.
#[derive(Debug, Clone)]
pub struct Ledger {
    nodes: IndexVec<NodeId, ComputeNode>,
    node_up: IndexVec<NodeId, bool>,
    timelines: IndexVec<NodeId, NodeTimeline>,
    jobs: Map<JobId, JobCommitment>,

    host_selection: HostSelection,
    core_allocation: CoreAllocation,
    rr_cursor: NodeId,
}

impl Ledger {
    pub fn new(
        nodes: Vec<ComputeNode>,
        host_selection: HostSelection,
        core_allocation: CoreAllocation,
    ) -> Self {
        let count = nodes.len();
        Ledger {
            nodes: nodes.into(),
            node_up: vec![true; count].into(),
            timelines: vec![NodeTimeline::default(); count].into(),
            jobs: Default::default(),
            host_selection,
            core_allocation,
            rr_cursor: NodeId::new(0),
        }
    }

    #[inline]
    pub fn nodes(&self) -> &[ComputeNode] {
        &self.nodes
    }

    pub fn node(&self, node_id: NodeId) -> Option<&ComputeNode> {
        self.nodes.get(node_id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        self.nodes.ids()
    }

    #[inline]
    pub fn host_selection(&self) -> HostSelection {
        self.host_selection
    }

    #[inline]
    pub fn core_allocation(&self) -> CoreAllocation {
        self.core_allocation
    }

    pub fn is_up(&self, node_id: NodeId) -> bool {
        self.node_up.get(node_id).copied().unwrap_or(false)
    }

    pub fn set_node_up(&mut self, node_id: NodeId, up: bool) {
        if let Some(state) = self.node_up.get_mut(node_id) {
            *state = up;
        }
    }

    pub fn commitment(&self, job_id: JobId) -> Option<&JobCommitment> {
        self.jobs.get(&job_id)
    }

    pub fn timeline(&self, node_id: NodeId) -> &NodeTimeline {
        &self.timelines[node_id]
    }

    /// Cores and memory the job would hold on `node`, `None` if it can never fit there.
    pub fn demand_on(&self, node: &ComputeNode, request: &ResourceRequest) -> Option<(u32, u64)> {
        if request.cores_per_node == 0 || request.cores_per_node > node.cores {
            return None;
        }
        let memory = match request.memory_per_node {
            Some(memory) => memory,
            None => {
                let share = node.memory as u128 * request.cores_per_node as u128
                    / node.cores as u128;
                share as u64
            }
        };
        if memory > node.memory {
            return None;
        }
        match self.core_allocation {
            CoreAllocation::Requested => Some((request.cores_per_node, memory)),
            CoreAllocation::WholeNode => Some((node.cores, node.memory)),
        }
    }

    /// Number of nodes that could host one part of the job in isolation.
    pub fn count_fitting_nodes(&self, request: &ResourceRequest, only_up: bool) -> usize {
        self.nodes
            .ids()
            .filter(|&node_id| !only_up || self.is_up(node_id))
            .filter(|&node_id| self.demand_on(&self.nodes[node_id], request).is_some())
            .count()
    }

    fn candidates_at(
        &self,
        start: SimTime,
        duration: Duration,
        request: &ResourceRequest,
    ) -> Vec<Candidate> {
        let finish = start.saturating_add(duration);
        self.nodes
            .ids()
            .filter(|&node_id| self.is_up(node_id))
            .filter_map(|node_id| {
                let node = &self.nodes[node_id];
                let (cores, memory) = self.demand_on(node, request)?;
                let (used_cores, used_memory) = self.timelines[node_id].peak_usage(start, finish);
                if fits(node, (used_cores, used_memory), (cores, memory)) {
                    Some(Candidate {
                        node_id,
                        residual_cores: node.cores - used_cores - cores,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    fn node_set(&self, node_ids: Vec<NodeId>, request: &ResourceRequest) -> NodeSet {
        node_ids
            .into_iter()
            .filter_map(|node_id| {
                let (cores, memory) = self.demand_on(&self.nodes[node_id], request)?;
                Some(NodeAllocation {
                    node_id,
                    cores,
                    memory,
                })
            })
            .collect()
    }

    fn place_at(
        &self,
        start: SimTime,
        duration: Duration,
        request: &ResourceRequest,
    ) -> Option<NodeSet> {
        let candidates = self.candidates_at(start, duration, request);
        let nodes =
            self.host_selection
                .select(candidates, request.n_nodes as usize, self.rr_cursor)?;
        Some(self.node_set(nodes, request))
    }

    /// Returns nodes on which the job can start at `now` and run for `duration`
    /// without colliding with any allocation or reservation.
    pub fn try_allocate_now(
        &self,
        now: SimTime,
        request: &ResourceRequest,
        duration: Duration,
    ) -> Result<NodeSet, LedgerError> {
        self.place_at(now, duration, request)
            .ok_or(LedgerError::Insufficient)
    }

    /// Finds the earliest instant not before `not_before` at which `request.n_nodes` nodes
    /// can host the job continuously for `duration`.
    ///
    /// Only `not_before` and the ends of existing commitments need to be checked, since
    /// free capacity only grows at those instants. Returns `None` if the job does not fit
    /// even on an empty cluster of currently-up nodes.
    pub fn earliest_feasible_window(
        &self,
        not_before: SimTime,
        request: &ResourceRequest,
        duration: Duration,
    ) -> Option<(SimTime, NodeSet)> {
        if self.count_fitting_nodes(request, true) < request.n_nodes as usize {
            return None;
        }
        let mut times: Vec<SimTime> = self
            .timelines
            .iter()
            .flat_map(|t| t.finish_times_after(not_before))
            .collect();
        times.push(not_before);
        times.sort();
        times.dedup();
        times
            .into_iter()
            .find_map(|time| Some((time, self.place_at(time, duration, request)?)))
    }

    fn commit(
        &mut self,
        job_id: JobId,
        kind: CommitmentKind,
        nodes: NodeSet,
        start: SimTime,
        finish: SimTime,
    ) -> Result<(), LedgerError> {
        if self.jobs.contains_key(&job_id) {
            return Err(LedgerError::AlreadyCommitted(job_id));
        }
        for alloc in &nodes {
            let node = &self.nodes[alloc.node_id];
            let (cores, memory) = self.timelines[alloc.node_id].peak_usage(start, finish);
            if !self.is_up(alloc.node_id)
                || !fits(node, (cores, memory), (alloc.cores, alloc.memory))
            {
                return Err(LedgerError::Overlap {
                    job_id,
                    node_id: alloc.node_id,
                });
            }
        }
        for alloc in &nodes {
            self.timelines[alloc.node_id].insert(Commitment {
                job_id,
                start,
                finish,
                cores: alloc.cores,
                memory: alloc.memory,
            });
        }
        self.jobs.insert(
            job_id,
            JobCommitment {
                kind,
                nodes,
                start,
                finish,
            },
        );
        Ok(())
    }

    /// Records that the job runs on `nodes` during `[start, finish)`.
    pub fn allocate(
        &mut self,
        job_id: JobId,
        nodes: NodeSet,
        start: SimTime,
        finish: SimTime,
    ) -> Result<(), LedgerError> {
        let last = nodes.last().map(|n| n.node_id);
        self.commit(job_id, CommitmentKind::Allocation, nodes, start, finish)?;
        if let Some(last) = last {
            self.rr_cursor = NodeId::new((last.as_num() + 1) % self.nodes.len() as u32);
        }
        Ok(())
    }

    /// Records a future commitment for a queued job.
    pub fn reserve(
        &mut self,
        job_id: JobId,
        nodes: NodeSet,
        start: SimTime,
        finish: SimTime,
    ) -> Result<(), LedgerError> {
        self.commit(job_id, CommitmentKind::Reservation, nodes, start, finish)
    }

    /// Finds nodes for the job at `now` and allocates them for `duration`.
    pub fn allocate_now(
        &mut self,
        job_id: JobId,
        now: SimTime,
        request: &ResourceRequest,
        duration: Duration,
    ) -> Result<NodeSet, LedgerError> {
        let nodes = self.try_allocate_now(now, request, duration)?;
        self.allocate(job_id, nodes.clone(), now, now.saturating_add(duration))?;
        Ok(nodes)
    }

    /// Reserves the earliest feasible window not before `not_before`.
    pub fn reserve_earliest(
        &mut self,
        job_id: JobId,
        not_before: SimTime,
        request: &ResourceRequest,
        duration: Duration,
    ) -> Result<(SimTime, NodeSet), LedgerError> {
        let (start, nodes) = self
            .earliest_feasible_window(not_before, request, duration)
            .ok_or(LedgerError::Insufficient)?;
        self.reserve(job_id, nodes.clone(), start, start.saturating_add(duration))?;
        Ok((start, nodes))
    }

    /// Removes everything the job holds. Releasing an unknown job does nothing.
    pub fn release(&mut self, job_id: JobId) -> Option<JobCommitment> {
        let commitment = self.jobs.remove(&job_id)?;
        for alloc in &commitment.nodes {
            self.timelines[alloc.node_id].remove_job(job_id);
        }
        Some(commitment)
    }

    /// Drops all reservations, returns the ids of the jobs that held them.
    pub fn release_reservations(&mut self) -> Vec<JobId> {
        let mut job_ids: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, c)| c.kind == CommitmentKind::Reservation)
            .map(|(job_id, _)| *job_id)
            .collect();
        job_ids.sort();
        for job_id in &job_ids {
            self.release(*job_id);
        }
        job_ids
    }

    pub fn sanity_check(&self) {
        for node_id in self.nodes.ids() {
            let node = &self.nodes[node_id];
            let timeline = &self.timelines[node_id];
            for commitment in timeline.commitments() {
                let (cores, memory) = timeline.usage_at(commitment.start);
                assert!(
                    cores <= node.cores && memory <= node.memory,
                    "node {node_id} overcommitted at {:?}",
                    commitment.start
                );
                let job = &self.jobs[&commitment.job_id];
                assert!(job.nodes.iter().any(|n| n.node_id == node_id));
            }
        }
        for (job_id, commitment) in &self.jobs {
            for alloc in &commitment.nodes {
                assert!(
                    self.timelines[alloc.node_id]
                        .commitments()
                        .iter()
                        .any(|c| c.job_id == *job_id)
                );
            }
        }
    }
}

/// Whether `extra` cores and memory can be added on top of `used` on the node.
fn fits(node: &ComputeNode, used: (u32, u64), extra: (u32, u64)) -> bool {
    extra.0 <= node.cores.saturating_sub(used.0) && extra.1 <= node.memory.saturating_sub(used.1)
}
