use std::cell::RefCell;
use std::time::Duration;

use crate::config::BatchConfig;
use crate::events::EventProcessor;
use crate::gateway::{BatchRequest, HypotheticalJob};
use crate::internal::common::Map;
use crate::internal::common::time::SimTime;
use crate::internal::job::{Job, JobState};
use crate::internal::ledger::{ComputeNode, NodeAllocation};
use crate::internal::server::comm::Comm;
use crate::internal::server::core::Core;
use crate::internal::server::eventqueue::Event;
use crate::internal::server::reactor::{
    on_cancel_job, on_estimate, on_resume, on_stop, on_submit_job, on_suspend,
};
use crate::internal::server::runloop::run_events;
use crate::internal::tests::utils::secs;
use crate::platform::SimulatedPlatform;
use crate::{FailureCause, JobId, NodeId};

pub const NODE_MEMORY: u64 = 1 << 30;

pub struct TestEnv {
    core: Core,
    pub comm: TestComm,
}

impl TestEnv {
    /// `n_nodes` identical nodes, a platform with one flop/s per core and a storage "ss".
    pub fn new(config: BatchConfig, n_nodes: u32, cores: u32) -> TestEnv {
        let nodes = (0..n_nodes)
            .map(|i| ComputeNode::new(format!("node{i}"), cores, NODE_MEMORY))
            .collect();
        Self::with_nodes(config, nodes, test_platform())
    }

    pub fn with_nodes(
        config: BatchConfig,
        nodes: Vec<ComputeNode>,
        platform: SimulatedPlatform,
    ) -> TestEnv {
        TestEnv {
            core: Core::new("batch".to_string(), config, nodes, Box::new(platform)).unwrap(),
            comm: Default::default(),
        }
    }

    pub fn core(&mut self) -> &mut Core {
        &mut self.core
    }

    pub fn job(&self, job_id: JobId) -> &Job {
        self.core.get_job(job_id)
    }

    pub fn job_state(&self, job_id: JobId) -> JobState {
        self.core.get_job(job_id).state()
    }

    pub fn new_job(&mut self, job: Job) -> JobId {
        self.core.add_job(job)
    }

    pub fn submit(
        &mut self,
        job_id: JobId,
        n_nodes: u32,
        cores: u32,
        walltime: u64,
    ) -> crate::Result<()> {
        on_submit_job(
            &mut self.core,
            &mut self.comm,
            job_id,
            BatchRequest::new(n_nodes, cores, secs(walltime)),
        )
    }

    pub fn submit_job(&mut self, job: Job, n_nodes: u32, cores: u32, walltime: u64) -> JobId {
        let job_id = self.new_job(job);
        self.submit(job_id, n_nodes, cores, walltime).unwrap();
        job_id
    }

    pub fn cancel(&mut self, job_id: JobId) -> crate::Result<()> {
        on_cancel_job(&mut self.core, &mut self.comm, job_id)
    }

    pub fn estimate(
        &self,
        jobs: &[HypotheticalJob],
    ) -> crate::Result<Map<String, Option<SimTime>>> {
        on_estimate(&self.core, jobs)
    }

    pub fn suspend(&mut self) -> crate::Result<()> {
        on_suspend(&mut self.core)
    }

    pub fn resume(&mut self) -> crate::Result<()> {
        on_resume(&mut self.core, &mut self.comm)
    }

    pub fn stop(&mut self) {
        on_stop(&mut self.core, &mut self.comm)
    }

    pub fn fail_node(&mut self, node_id: u32, at: u64) {
        self.core
            .schedule_event(secs(at), Event::NodeFailed(NodeId::new(node_id)));
    }

    pub fn restore_node(&mut self, node_id: u32, at: u64) {
        self.core
            .schedule_event(secs(at), Event::NodeRestored(NodeId::new(node_id)));
    }

    pub fn run_until(&mut self, time: u64) {
        run_events(&mut self.core, &mut self.comm, Some(secs(time)));
        self.core.sanity_check();
    }

    pub fn run(&mut self) {
        run_events(&mut self.core, &mut self.comm, None);
        self.core.sanity_check();
    }

    pub fn start_secs(&self, job_id: JobId) -> Option<f64> {
        self.job(job_id).start_date().map(|t| t.as_secs_f64())
    }

    pub fn end_secs(&self, job_id: JobId) -> Option<f64> {
        self.job(job_id).end_date().map(|t| t.as_secs_f64())
    }

    /// Reserved start of a queued job, `None` if it is not queued or holds no reservation.
    pub fn reserved_start(&self, job_id: JobId) -> Option<SimTime> {
        self.core.queue().get(job_id).and_then(|q| q.reserved_start)
    }

    pub fn now(&self) -> Duration {
        self.core.now()
    }
}

pub fn test_platform() -> SimulatedPlatform {
    let mut platform = SimulatedPlatform::new(1.0);
    platform.add_storage("ss", 1000);
    platform
}

#[derive(Default)]
pub struct RecordedEvents {
    started: RefCell<Vec<(JobId, Vec<NodeId>)>>,
    completed: RefCell<Vec<JobId>>,
    discontinued: RefCell<Vec<(JobId, FailureCause)>>,
}

impl EventProcessor for RecordedEvents {
    fn on_job_started(&self, job_id: JobId, nodes: &[NodeAllocation], _now: SimTime) {
        self.started
            .borrow_mut()
            .push((job_id, nodes.iter().map(|n| n.node_id).collect()));
    }

    fn on_job_completed(&self, job_id: JobId, _now: SimTime) {
        self.completed.borrow_mut().push(job_id);
    }

    fn on_job_discontinued(&self, job_id: JobId, cause: &FailureCause, _now: SimTime) {
        self.discontinued.borrow_mut().push((job_id, cause.clone()));
    }
}

#[derive(Default)]
pub struct TestComm {
    pub events: RecordedEvents,
    pub need_processing: bool,
}

impl TestComm {
    pub fn take_started(&mut self, len: usize) -> Vec<(JobId, Vec<NodeId>)> {
        let started = self.events.started.take();
        assert_eq!(started.len(), len);
        started
    }

    pub fn take_completed(&mut self, len: usize) -> Vec<JobId> {
        let completed = self.events.completed.take();
        assert_eq!(completed.len(), len);
        completed
    }

    pub fn take_discontinued(&mut self, len: usize) -> Vec<(JobId, FailureCause)> {
        let discontinued = self.events.discontinued.take();
        assert_eq!(discontinued.len(), len);
        discontinued
    }

    pub fn check_need_processing(&mut self) {
        assert!(self.need_processing);
        self.need_processing = false;
    }

    pub fn emptiness_check(&self) {
        assert!(self.events.started.borrow().is_empty());
        assert!(self.events.completed.borrow().is_empty());
        assert!(self.events.discontinued.borrow().is_empty());
    }
}

impl Comm for TestComm {
    fn ask_for_processing(&mut self) {
        self.need_processing = true;
    }

    fn client(&mut self) -> &mut dyn EventProcessor {
        &mut self.events
    }
}
