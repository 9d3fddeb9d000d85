use crate::gateway::{BatchRequest, HypotheticalJob};
use crate::internal::common::Map;
use crate::internal::common::error::{BatchError, FailureCause};
use crate::internal::common::ids::{ActionRef, JobId, NodeId};
use crate::internal::common::time::{SimTime, fmt_time};
use crate::internal::job::action::ActionPlacement;
use crate::internal::job::{ActionState, JobState};
use crate::internal::ledger::NodeSet;
use crate::internal::scheduler::estimator::estimate_start_times;
use crate::internal::scheduler::{AdminCommand, DispatchDecision, PolicyEvent, QueuedJob};
use crate::internal::server::comm::Comm;
use crate::internal::server::core::{Core, ServiceState};
use crate::internal::server::eventqueue::Event;
use crate::internal::server::executor::{RunningJob, start_ready_actions, terminate_actions};

pub fn on_submit_job(
    core: &mut Core,
    comm: &mut impl Comm,
    job_id: JobId,
    request: BatchRequest,
) -> crate::Result<()> {
    core.check_accepting()?;
    let state = core
        .jobs()
        .find(job_id)
        .ok_or(BatchError::UnknownJob(job_id))?
        .state();
    if state != JobState::NotSubmitted {
        return Err(FailureCause::NotAllowed {
            service: core.name().to_string(),
            message: format!("job {job_id} is {state:?}"),
        }
        .into());
    }
    request.validate()?;
    validate_request(core, job_id, &request)?;

    let now = core.now();
    let job = core.get_job_mut(job_id);
    job.state = JobState::Submitted;
    job.request = Some(request);
    job.submit_date = Some(now);
    log::debug!(
        "Job {job_id} submitted at {}: {} nodes x {} cores, walltime {:?}",
        fmt_time(now),
        request.resources.n_nodes,
        request.resources.cores_per_node,
        request.walltime
    );

    if let Some(parent_id) = core.jobs().discontinued_parent(job_id) {
        discontinue_pending_job(
            core,
            comm,
            job_id,
            FailureCause::ParentJobDiscontinued { job_id, parent_id },
        );
    } else if core.jobs().pending_parents(job_id).next().is_some() {
        log::debug!("Job {job_id} waits for its parent jobs");
        core.waiting_mut().insert(job_id);
    } else {
        enqueue_job(core, comm, job_id);
    }
    Ok(())
}

/// The job has to fit on enough nodes of the cluster when they are all empty,
/// and each of its actions has to fit into the per-node allocation.
fn validate_request(
    core: &Core,
    job_id: JobId,
    request: &BatchRequest,
) -> Result<(), FailureCause> {
    let ledger = core.ledger();
    let (action_cores, action_ram) = core.get_job(job_id).action_demands();
    let fitting = ledger
        .nodes()
        .iter()
        .filter(|node| {
            ledger
                .demand_on(node, &request.resources)
                .is_some_and(|(cores, memory)| cores >= action_cores && memory >= action_ram)
        })
        .count();
    if fitting < request.resources.n_nodes as usize {
        log::warn!(
            "Job {job_id} rejected by '{}': only {fitting} nodes can host it",
            core.name()
        );
        return Err(FailureCause::NotEnoughResources {
            job_id,
            service: core.name().to_string(),
        });
    }
    Ok(())
}

fn enqueue_job(core: &mut Core, comm: &mut impl Comm, job_id: JobId) {
    let now = core.now();
    let overhead = core.config().submission_overhead;
    let job = core.get_job(job_id);
    let Some(request) = job.request().copied() else {
        log::error!("Job {job_id} has no batch request");
        return;
    };
    let submit_date = job.submit_date().unwrap_or(now);
    core.queue_mut().push(QueuedJob {
        job_id,
        resources: request.resources,
        requested_time: request.requested_time(overhead),
        submit_date,
        reserved_start: None,
        wakeup: None,
    });
    run_policy(core, comm, PolicyEvent::JobSubmitted(job_id));
}

/// Consults the scheduling policy and carries out its decisions.
/// Nothing is dispatched unless the service is up.
pub(crate) fn run_policy(core: &mut Core, comm: &mut impl Comm, event: PolicyEvent) {
    if core.state() != ServiceState::Up {
        return;
    }
    let (policy, mut ctx) = core.split_policy_mut();
    let decisions = policy.on_event(&mut ctx, event);
    for decision in decisions {
        match decision {
            DispatchDecision::StartNow { job_id, nodes } => start_job(core, comm, job_id, nodes),
            DispatchDecision::Reserve { job_id, start, .. } => {
                set_reservation(core, comm, job_id, start)
            }
        }
    }
}

fn set_reservation(core: &mut Core, comm: &mut impl Comm, job_id: JobId, start: SimTime) {
    let now = core.now();
    let Some(queued) = core.queue_mut().get_mut(job_id) else {
        return;
    };
    queued.reserved_start = Some(start);
    if let Some(event_id) = queued.wakeup.take() {
        core.events_mut().cancel(event_id);
    }
    if start > now {
        let event_id = core.schedule_event(start, Event::ReservationDue(job_id));
        if let Some(queued) = core.queue_mut().get_mut(job_id) {
            queued.wakeup = Some(event_id);
        }
        comm.ask_for_processing();
    }
}

fn start_job(core: &mut Core, comm: &mut impl Comm, job_id: JobId, nodes: NodeSet) {
    let Some(queued) = core.queue_mut().remove(job_id) else {
        log::error!("Starting job {job_id} that is not queued");
        return;
    };
    if let Some(event_id) = queued.wakeup {
        core.events_mut().cancel(event_id);
    }
    let now = core.now();
    let overhead = core.config().submission_overhead;
    let launch_event =
        core.schedule_event(now.saturating_add(overhead), Event::JobLaunch(job_id));
    let walltime_event = core.schedule_event(
        now.saturating_add(queued.requested_time),
        Event::WalltimeExpired(job_id),
    );
    core.get_job_mut(job_id).start_date = Some(now);

    log::debug!(
        "Job {job_id} started at {} on nodes {:?}",
        fmt_time(now),
        nodes.iter().map(|n| n.node_id).collect::<Vec<_>>()
    );
    comm.client().on_job_started(job_id, &nodes, now);
    core.running_mut().insert(
        job_id,
        RunningJob::new(nodes, launch_event, walltime_event),
    );
    comm.ask_for_processing();
}

pub fn on_job_launch(core: &mut Core, comm: &mut impl Comm, job_id: JobId) {
    let Some(running) = core.running_mut().get_mut(&job_id) else {
        return;
    };
    running.launched = true;
    running.launch_event = None;
    if core.get_job(job_id).all_actions_completed() {
        complete_job(core, comm, job_id);
    } else {
        start_ready_actions(core, job_id);
    }
}

pub fn on_action_finished(
    core: &mut Core,
    comm: &mut impl Comm,
    action_ref: ActionRef,
    result: Result<(), FailureCause>,
) {
    let job_id = action_ref.job_id();
    let action_id = action_ref.action_id();
    let now = core.now();
    let placement = core.get_job(job_id).action(action_id).placement().copied();
    let Some(running) = core.running_mut().get_mut(&job_id) else {
        return;
    };
    if running.action_events.remove(&action_id).is_none() {
        return;
    }
    if let Some(placement) = placement {
        running.release_placement(&placement);
    }

    match result {
        Ok(()) => {
            log::debug!("Action {action_ref} completed at {}", fmt_time(now));
            let job = core.get_job_mut(job_id);
            job.action_mut(action_id).set_completed(now);
            if job.all_actions_completed() {
                complete_job(core, comm, job_id);
            } else {
                start_ready_actions(core, job_id);
            }
        }
        Err(cause) => {
            log::debug!("Action {action_ref} failed at {}: {cause}", fmt_time(now));
            core.get_job_mut(job_id).action_mut(action_id).set_terminated(
                now,
                ActionState::Failed,
                cause.clone(),
            );
            let killed = FailureCause::JobKilled {
                job_id,
                service: core.name().to_string(),
            };
            discontinue_running_job(core, comm, job_id, cause, |_| {
                (ActionState::Killed, killed.clone())
            });
        }
    }
}

fn set_job_terminal(
    core: &mut Core,
    comm: &mut impl Comm,
    job_id: JobId,
    cause: Option<FailureCause>,
) {
    let now = core.now();
    let job = core.get_job_mut(job_id);
    job.end_date = Some(now);
    match cause {
        None => {
            job.state = JobState::Completed;
            log::debug!("Job {job_id} completed at {}", fmt_time(now));
            comm.client().on_job_completed(job_id, now);
        }
        Some(cause) => {
            job.state = JobState::Discontinued;
            log::debug!("Job {job_id} discontinued at {}: {cause}", fmt_time(now));
            comm.client().on_job_discontinued(job_id, &cause, now);
            job.failure_cause = Some(cause);
        }
    }
    core.mark_finished(job_id);
}

fn complete_job(core: &mut Core, comm: &mut impl Comm, job_id: JobId) {
    let Some(running) = core.running_mut().remove(&job_id) else {
        return;
    };
    for event_id in running.pending_events() {
        core.events_mut().cancel(event_id);
    }
    core.ledger_mut().release(job_id);
    set_job_terminal(core, comm, job_id, None);

    let children = core.jobs().children(job_id).to_vec();
    for child in children {
        if core.waiting().contains(&child) && core.jobs().pending_parents(child).next().is_none()
        {
            core.waiting_mut().remove(&child);
            enqueue_job(core, comm, child);
        }
    }
    run_policy(core, comm, PolicyEvent::JobFinished(job_id));
}

/// Ends a running job: its started actions are terminated as decided by `outcome`,
/// its allocation and timers are dropped.
fn discontinue_running_job(
    core: &mut Core,
    comm: &mut impl Comm,
    job_id: JobId,
    cause: FailureCause,
    outcome: impl FnMut(&ActionPlacement) -> (ActionState, FailureCause),
) {
    terminate_actions(core, job_id, outcome);
    let Some(running) = core.running_mut().remove(&job_id) else {
        return;
    };
    for event_id in running.pending_events() {
        core.events_mut().cancel(event_id);
    }
    core.ledger_mut().release(job_id);
    set_job_terminal(core, comm, job_id, Some(cause));
    discontinue_dependents(core, comm, job_id);
    run_policy(core, comm, PolicyEvent::JobFailed(job_id));
}

/// Ends a job that does not hold an allocation (queued or waiting for its parents).
fn discontinue_pending_job(
    core: &mut Core,
    comm: &mut impl Comm,
    job_id: JobId,
    cause: FailureCause,
) {
    if core.get_job(job_id).state().is_terminal() {
        return;
    }
    if let Some(event_id) = core.queue_mut().remove(job_id).and_then(|q| q.wakeup) {
        core.events_mut().cancel(event_id);
    }
    core.waiting_mut().remove(&job_id);
    core.ledger_mut().release(job_id);
    set_job_terminal(core, comm, job_id, Some(cause));
    discontinue_dependents(core, comm, job_id);
}

/// Children that cannot run anymore are discontinued, transitively.
fn discontinue_dependents(core: &mut Core, comm: &mut impl Comm, parent_id: JobId) {
    let children = core.jobs().children(parent_id).to_vec();
    for child in children {
        let state = core.get_job(child).state();
        let pending = state == JobState::NotSubmitted
            || (state == JobState::Submitted && core.waiting().contains(&child));
        if pending {
            discontinue_pending_job(
                core,
                comm,
                child,
                FailureCause::ParentJobDiscontinued {
                    job_id: child,
                    parent_id,
                },
            );
        }
    }
}

pub fn on_walltime_expired(core: &mut Core, comm: &mut impl Comm, job_id: JobId) {
    if !core.running().contains_key(&job_id) {
        return;
    }
    log::debug!("Job {job_id} reached its walltime at {}", fmt_time(core.now()));
    let cause = FailureCause::JobTimeout { job_id };
    let killed = cause.clone();
    discontinue_running_job(core, comm, job_id, cause, |_| {
        (ActionState::Killed, killed.clone())
    });
}

pub fn on_reservation_due(core: &mut Core, comm: &mut impl Comm, job_id: JobId) {
    if let Some(queued) = core.queue_mut().get_mut(job_id) {
        queued.wakeup = None;
    }
    run_policy(core, comm, PolicyEvent::ClockAdvanced);
}

pub fn on_cancel_job(core: &mut Core, comm: &mut impl Comm, job_id: JobId) -> crate::Result<()> {
    core.check_accepting()?;
    let state = core
        .jobs()
        .find(job_id)
        .ok_or(BatchError::UnknownJob(job_id))?
        .state();
    let cause = FailureCause::JobKilled {
        job_id,
        service: core.name().to_string(),
    };
    if core.running().contains_key(&job_id) {
        log::debug!("Cancelling running job {job_id}");
        let killed = cause.clone();
        discontinue_running_job(core, comm, job_id, cause, |_| {
            (ActionState::Killed, killed.clone())
        });
        return Ok(());
    }
    let pending = state == JobState::Submitted
        && (core.queue().contains(job_id) || core.waiting().contains(&job_id));
    if !pending {
        return Err(FailureCause::NotAllowed {
            service: core.name().to_string(),
            message: format!("job {job_id} is neither pending nor running"),
        }
        .into());
    }
    log::debug!("Cancelling pending job {job_id}");
    discontinue_pending_job(core, comm, job_id, cause);
    run_policy(
        core,
        comm,
        PolicyEvent::Administrative(AdminCommand::Cancel(job_id)),
    );
    Ok(())
}

fn host_error(core: &Core, node_id: NodeId) -> FailureCause {
    FailureCause::HostError {
        node_id,
        host: core
            .ledger()
            .node(node_id)
            .map(|n| n.name.clone())
            .unwrap_or_default(),
    }
}

pub fn on_node_failed(core: &mut Core, comm: &mut impl Comm, node_id: NodeId) {
    if !core.ledger().is_up(node_id) {
        return;
    }
    log::info!("Node {node_id} failed at {}", fmt_time(core.now()));
    core.ledger_mut().set_node_up(node_id, false);
    let cause = host_error(core, node_id);
    let affected: Vec<JobId> = core
        .running_job_ids()
        .into_iter()
        .filter(|job_id| core.running()[job_id].uses_node(node_id))
        .collect();
    for job_id in affected {
        let killed = FailureCause::JobKilled {
            job_id,
            service: core.name().to_string(),
        };
        let failed = cause.clone();
        discontinue_running_job(core, comm, job_id, cause.clone(), |placement| {
            if placement.node_id == node_id {
                (ActionState::Failed, failed.clone())
            } else {
                (ActionState::Killed, killed.clone())
            }
        });
    }
    run_policy(core, comm, PolicyEvent::NodeFailed(node_id));
}

pub fn on_node_restored(core: &mut Core, comm: &mut impl Comm, node_id: NodeId) {
    if core.ledger().node(node_id).is_none() || core.ledger().is_up(node_id) {
        return;
    }
    log::info!("Node {node_id} restored at {}", fmt_time(core.now()));
    core.ledger_mut().set_node_up(node_id, true);
    run_policy(
        core,
        comm,
        PolicyEvent::Administrative(AdminCommand::RestoreNode(node_id)),
    );
}

pub fn on_suspend(core: &mut Core) -> crate::Result<()> {
    match core.state() {
        ServiceState::Down => Err(FailureCause::ServiceIsDown {
            service: core.name().to_string(),
        }
        .into()),
        ServiceState::Suspended => Ok(()),
        ServiceState::Up => {
            core.set_state(ServiceState::Suspended);
            Ok(())
        }
    }
}

pub fn on_resume(core: &mut Core, comm: &mut impl Comm) -> crate::Result<()> {
    match core.state() {
        ServiceState::Down => Err(FailureCause::ServiceIsDown {
            service: core.name().to_string(),
        }
        .into()),
        ServiceState::Up => Ok(()),
        ServiceState::Suspended => {
            core.set_state(ServiceState::Up);
            run_policy(
                core,
                comm,
                PolicyEvent::Administrative(AdminCommand::Resume),
            );
            Ok(())
        }
    }
}

/// Shuts the service down. Running jobs lose their hosts, pending jobs are killed.
pub fn on_stop(core: &mut Core, comm: &mut impl Comm) {
    if core.state() == ServiceState::Down {
        return;
    }
    core.set_state(ServiceState::Down);

    for job_id in core.running_job_ids() {
        let Some(first) = core.running()[&job_id].nodes.first().map(|n| n.node_id) else {
            continue;
        };
        let cause = host_error(core, first);
        let names: Map<NodeId, FailureCause> = core.running()[&job_id]
            .nodes
            .iter()
            .map(|n| (n.node_id, host_error(core, n.node_id)))
            .collect();
        discontinue_running_job(core, comm, job_id, cause.clone(), |placement| {
            (
                ActionState::Failed,
                names
                    .get(&placement.node_id)
                    .cloned()
                    .unwrap_or_else(|| cause.clone()),
            )
        });
    }

    let mut pending = core.queue().job_ids();
    let mut waiting: Vec<JobId> = core.waiting().iter().copied().collect();
    waiting.sort();
    pending.extend(waiting);
    for job_id in pending {
        let cause = FailureCause::JobKilled {
            job_id,
            service: core.name().to_string(),
        };
        discontinue_pending_job(core, comm, job_id, cause);
    }
    core.events_mut().clear();
}

pub fn on_estimate(
    core: &Core,
    jobs: &[HypotheticalJob],
) -> crate::Result<Map<String, Option<SimTime>>> {
    core.check_accepting()?;
    if !core
        .policy()
        .supports_estimates(core.ledger().host_selection())
    {
        return Err(FailureCause::FunctionalityNotAvailable {
            service: core.name().to_string(),
            functionality: format!(
                "start time estimates ({}, {:?})",
                core.policy().name(),
                core.ledger().host_selection()
            ),
        }
        .into());
    }
    Ok(estimate_start_times(
        core.policy(),
        core.ledger(),
        core.queue(),
        core.now(),
        core.config().submission_overhead,
        jobs,
    ))
}

pub fn process_event(core: &mut Core, comm: &mut impl Comm, event: Event) {
    match event {
        Event::JobLaunch(job_id) => on_job_launch(core, comm, job_id),
        Event::ActionFinished { action, result } => on_action_finished(core, comm, action, result),
        Event::WalltimeExpired(job_id) => on_walltime_expired(core, comm, job_id),
        Event::ReservationDue(job_id) => on_reservation_due(core, comm, job_id),
        Event::NodeFailed(node_id) => on_node_failed(core, comm, node_id),
        Event::NodeRestored(node_id) => on_node_restored(core, comm, node_id),
    }
}
