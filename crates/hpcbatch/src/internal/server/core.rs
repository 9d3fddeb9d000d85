use std::time::Duration;

use crate::config::BatchConfig;
use crate::internal::common::error::{BatchError, FailureCause};
use crate::internal::common::ids::{EventId, JobId};
use crate::internal::common::time::SimTime;
use crate::internal::common::{Map, Set, WrappedRcRefCell};
use crate::internal::job::{Job, JobMap, JobState};
use crate::internal::ledger::{ComputeNode, Ledger};
use crate::internal::scheduler::{BatchQueue, SchedulingContext, SchedulingPolicy};
use crate::internal::server::eventqueue::{Event, EventQueue};
use crate::internal::server::executor::RunningJob;
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Up,
    Suspended,
    Down,
}

/// State of one batch service: the only owner of its ledger, queue and jobs.
pub struct Core {
    name: String,
    config: BatchConfig,
    state: ServiceState,
    now: SimTime,

    jobs: JobMap,
    queue: BatchQueue,
    /// Submitted jobs whose parent jobs have not completed yet
    waiting: Set<JobId>,
    running: Map<JobId, RunningJob>,
    /// Jobs in the order in which they reached a terminal state
    finished: Vec<JobId>,

    ledger: Ledger,
    policy: SchedulingPolicy,
    events: EventQueue,
    platform: Box<dyn Platform>,
}

pub type CoreRef = WrappedRcRefCell<Core>;

impl Core {
    pub fn new(
        name: String,
        config: BatchConfig,
        nodes: Vec<ComputeNode>,
        platform: Box<dyn Platform>,
    ) -> crate::Result<Self> {
        if nodes.is_empty() {
            return Err(BatchError::ConfigurationError(format!(
                "Service '{name}' has no compute nodes"
            )));
        }
        if let Some(node) = nodes.iter().find(|n| n.cores == 0) {
            return Err(BatchError::ConfigurationError(format!(
                "Node '{}' has no cores",
                node.name
            )));
        }
        let ledger = Ledger::new(
            nodes,
            config.host_selection,
            config.effective_core_allocation(),
        );
        let policy = SchedulingPolicy::new(config.scheduling_algorithm);
        log::info!(
            "Service '{name}' created: {} nodes, policy {}, host selection {:?}, core allocation {:?}",
            ledger.nodes().len(),
            policy.name(),
            ledger.host_selection(),
            ledger.core_allocation(),
        );
        Ok(Core {
            name,
            config,
            state: ServiceState::Up,
            now: Duration::ZERO,
            jobs: Default::default(),
            queue: Default::default(),
            waiting: Default::default(),
            running: Default::default(),
            finished: Default::default(),
            ledger,
            policy,
            events: Default::default(),
            platform,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub(crate) fn advance_clock(&mut self, time: SimTime) {
        self.now = self.now.max(time);
    }

    #[inline]
    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ServiceState) {
        log::info!("Service '{}' is now {state:?}", self.name);
        self.state = state;
    }

    /// Fails if the service does not take new work.
    pub fn check_accepting(&self) -> Result<(), FailureCause> {
        match self.state {
            ServiceState::Up => Ok(()),
            ServiceState::Suspended => Err(FailureCause::ServiceIsSuspended {
                service: self.name.clone(),
            }),
            ServiceState::Down => Err(FailureCause::ServiceIsDown {
                service: self.name.clone(),
            }),
        }
    }

    #[inline]
    pub fn jobs(&self) -> &JobMap {
        &self.jobs
    }

    #[inline]
    pub fn jobs_mut(&mut self) -> &mut JobMap {
        &mut self.jobs
    }

    #[inline]
    pub fn get_job(&self, job_id: JobId) -> &Job {
        self.jobs.get(job_id)
    }

    #[inline]
    pub fn get_job_mut(&mut self, job_id: JobId) -> &mut Job {
        self.jobs.get_mut(job_id)
    }

    pub fn add_job(&mut self, job: Job) -> JobId {
        let job_id = self.jobs.insert(job);
        log::debug!("New job {job_id} in service '{}'", self.name);
        job_id
    }

    #[inline]
    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    #[inline]
    pub fn queue_mut(&mut self) -> &mut BatchQueue {
        &mut self.queue
    }

    #[inline]
    pub fn waiting(&self) -> &Set<JobId> {
        &self.waiting
    }

    #[inline]
    pub fn waiting_mut(&mut self) -> &mut Set<JobId> {
        &mut self.waiting
    }

    #[inline]
    pub fn running(&self) -> &Map<JobId, RunningJob> {
        &self.running
    }

    #[inline]
    pub fn running_mut(&mut self) -> &mut Map<JobId, RunningJob> {
        &mut self.running
    }

    pub fn running_job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.running.keys().copied().collect();
        ids.sort();
        ids
    }

    #[inline]
    pub fn finished(&self) -> &[JobId] {
        &self.finished
    }

    pub(crate) fn mark_finished(&mut self, job_id: JobId) {
        debug_assert!(self.jobs.get(job_id).state().is_terminal());
        self.finished.push(job_id);
    }

    #[inline]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[inline]
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    #[inline]
    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    pub fn schedule_event(&mut self, time: SimTime, event: Event) -> EventId {
        self.events.schedule(time, event)
    }

    #[inline]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    #[inline]
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    pub fn split_policy_mut(&mut self) -> (&mut SchedulingPolicy, SchedulingContext<'_>) {
        (
            &mut self.policy,
            SchedulingContext {
                now: self.now,
                ledger: &mut self.ledger,
                queue: &self.queue,
            },
        )
    }

    /// Gives the executor everything it needs to start an action.
    pub fn split_executor_mut(
        &mut self,
    ) -> (&mut JobMap, &mut Map<JobId, RunningJob>, &Ledger, &mut dyn Platform, &mut EventQueue) {
        (
            &mut self.jobs,
            &mut self.running,
            &self.ledger,
            self.platform.as_mut(),
            &mut self.events,
        )
    }

    pub fn sanity_check(&self) {
        self.ledger.sanity_check();
        for job_id in self.queue.job_ids() {
            assert_eq!(self.jobs.get(job_id).state(), JobState::Submitted);
            assert!(!self.running.contains_key(&job_id));
            assert!(!self.waiting.contains(&job_id));
        }
        for (job_id, running) in &self.running {
            assert_eq!(self.jobs.get(*job_id).state(), JobState::Submitted);
            assert!(
                self.ledger
                    .commitment(*job_id)
                    .is_some_and(|c| c.nodes == running.nodes),
                "running job {job_id} does not match its allocation"
            );
        }
        for job_id in &self.finished {
            assert!(self.jobs.get(*job_id).state().is_terminal());
            assert!(self.ledger.commitment(*job_id).is_none());
        }
    }
}
