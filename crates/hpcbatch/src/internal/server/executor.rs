use std::cmp::Reverse;

use smallvec::SmallVec;

use crate::config::{ActionCoreAllocation, ActionSelection};
use crate::internal::common::Map;
use crate::internal::common::error::FailureCause;
use crate::internal::common::ids::{ActionId, ActionRef, EventId, JobId, NodeId};
use crate::internal::common::time::SimTime;
use crate::internal::job::action::ActionPlacement;
use crate::internal::job::{ActionKind, ActionState, Job};
use crate::internal::ledger::{ComputeNode, NodeSet};
use crate::internal::server::core::Core;
use crate::internal::server::eventqueue::Event;
use crate::platform::{ActionContext, Outcome, Platform};

/// Execution state of a job that holds an allocation.
#[derive(Debug)]
pub struct RunningJob {
    pub nodes: NodeSet,
    /// Free cores and memory per allocated node, indexed like `nodes`
    free: SmallVec<[(u32, u64); 4]>,
    pub launched: bool,
    pub launch_event: Option<EventId>,
    pub walltime_event: EventId,
    pub action_events: Map<ActionId, EventId>,
}

impl RunningJob {
    pub fn new(nodes: NodeSet, launch_event: EventId, walltime_event: EventId) -> Self {
        let free = nodes.iter().map(|n| (n.cores, n.memory)).collect();
        RunningJob {
            nodes,
            free,
            launched: false,
            launch_event: Some(launch_event),
            walltime_event,
            action_events: Default::default(),
        }
    }

    pub fn uses_node(&self, node_id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.node_id == node_id)
    }

    /// Node with the most free cores that fits the action, lowest index on ties.
    fn pick_node(&self, min_cores: u32, ram: u64) -> Option<usize> {
        self.free
            .iter()
            .enumerate()
            .filter(|(_, (cores, memory))| *cores >= min_cores && *memory >= ram)
            .max_by_key(|(index, (cores, _))| (*cores, Reverse(*index)))
            .map(|(index, _)| index)
    }

    fn node_index(&self, node_id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.node_id == node_id)
    }

    pub(crate) fn release_placement(&mut self, placement: &ActionPlacement) {
        if let Some(index) = self.node_index(placement.node_id) {
            self.free[index].0 += placement.cores;
            self.free[index].1 += placement.memory;
        }
    }

    /// Events that still belong to this job.
    pub fn pending_events(&self) -> impl Iterator<Item = EventId> + '_ {
        self.launch_event
            .iter()
            .copied()
            .chain(std::iter::once(self.walltime_event))
            .chain(self.action_events.values().copied())
    }
}

fn sort_ready_actions(job: &Job, ready: &mut [ActionId], selection: ActionSelection) {
    match selection {
        ActionSelection::MaximumFlops => ready.sort_by(|a, b| {
            let fa = job.action(*a).kind.flops();
            let fb = job.action(*b).kind.flops();
            fb.total_cmp(&fa).then(a.cmp(b))
        }),
        ActionSelection::MaximumMinimumCores => {
            ready.sort_by_key(|a| (Reverse(job.action(*a).kind.requirements().0), *a))
        }
        ActionSelection::MinimumTopLevel => {
            let levels = job.action_graph().top_levels(ready);
            ready.sort_by_key(|a| (levels.get(a).copied().unwrap_or(0), *a))
        }
    }
}

fn run_action(
    platform: &mut dyn Platform,
    kind: &ActionKind,
    job_id: JobId,
    node: &ComputeNode,
    cores: u32,
    now: SimTime,
) -> Outcome {
    match kind {
        ActionKind::Compute { flops, .. } => platform.compute(node, cores, *flops),
        ActionKind::Sleep { duration } => Outcome::success(*duration),
        ActionKind::FileRead { file, location } => platform.read_file(file, location, node),
        ActionKind::FileWrite { file, location } => platform.write_file(file, location, node),
        ActionKind::FileCopy { file, src, dst } => platform.copy_file(file, src, dst),
        ActionKind::FileDelete { file, location } => platform.delete_file(file, location),
        ActionKind::Custom(custom) => {
            let ctx = ActionContext {
                job_id,
                node,
                cores,
                now,
            };
            (custom.work)(platform, &ctx)
        }
    }
}

/// Starts every ready action of the job that fits into the free part of its allocation.
pub fn start_ready_actions(core: &mut Core, job_id: JobId) {
    let now = core.now();
    let selection = core.config().action_selection;
    let core_allocation = core.config().action_core_allocation;
    let (jobs, running_jobs, ledger, platform, events) = core.split_executor_mut();
    let Some(running) = running_jobs.get_mut(&job_id) else {
        return;
    };
    if !running.launched {
        return;
    }
    let job = jobs.get_mut(job_id);
    let mut ready = job.ready_actions();
    sort_ready_actions(job, &mut ready, selection);

    for action_id in ready {
        let (min_cores, max_cores, ram) = job.action(action_id).kind.requirements();
        let Some(index) = running.pick_node(min_cores, ram) else {
            log::debug!("Action {job_id}@{action_id} waits for free cores");
            continue;
        };
        let free_cores = running.free[index].0;
        let cores = match core_allocation {
            ActionCoreAllocation::Aggressive => max_cores.min(free_cores).max(min_cores),
            ActionCoreAllocation::Minimum => min_cores,
        };
        let node_id = running.nodes[index].node_id;
        let Some(node) = ledger.node(node_id) else {
            continue;
        };
        running.free[index].0 -= cores;
        running.free[index].1 -= ram;

        let outcome = run_action(
            platform,
            &job.action(action_id).kind,
            job_id,
            node,
            cores,
            now,
        );
        job.action_mut(action_id).set_started(
            now,
            ActionPlacement {
                node_id,
                cores,
                memory: ram,
            },
        );
        log::debug!(
            "Action {job_id}@{action_id} started on node {node_id} with {cores} cores, takes {:?}",
            outcome.duration
        );
        let event_id = events.schedule(
            now.saturating_add(outcome.duration),
            Event::ActionFinished {
                action: ActionRef::new(job_id, action_id),
                result: outcome.result,
            },
        );
        running.action_events.insert(action_id, event_id);
    }
}

/// Ends every started action of the job, the closure decides the final state and cause.
pub fn terminate_actions(
    core: &mut Core,
    job_id: JobId,
    mut outcome: impl FnMut(&ActionPlacement) -> (ActionState, FailureCause),
) {
    let now = core.now();
    let (jobs, running_jobs, _, _, events) = core.split_executor_mut();
    let Some(running) = running_jobs.get_mut(&job_id) else {
        return;
    };
    let job = jobs.get_mut(job_id);
    let mut action_ids: Vec<ActionId> = running.action_events.keys().copied().collect();
    action_ids.sort();
    for action_id in action_ids {
        if let Some(event_id) = running.action_events.remove(&action_id) {
            events.cancel(event_id);
        }
        let action = job.action_mut(action_id);
        let Some(placement) = action.placement().copied() else {
            continue;
        };
        let (state, cause) = outcome(&placement);
        log::debug!("Action {job_id}@{action_id} ends as {state:?}: {cause}");
        action.set_terminated(now, state, cause);
        running.release_placement(&placement);
    }
}
