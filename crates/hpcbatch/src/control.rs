use std::future::Future;
use std::rc::Rc;

use tokio::sync::Notify;

use crate::config::BatchConfig;
use crate::events::EventProcessor;
use crate::gateway::{BatchRequest, HypotheticalJob, JobRecord};
use crate::internal::common::error::BatchError;
use crate::internal::common::time::SimTime;
use crate::internal::job::{Job, JobState};
use crate::internal::ledger::ComputeNode;
use crate::internal::scheduler::QueuedJob;
use crate::internal::server::comm::{Comm, CommSenderRef};
use crate::internal::server::core::{Core, CoreRef, ServiceState};
use crate::internal::server::eventqueue::Event;
use crate::internal::server::reactor::{
    on_cancel_job, on_estimate, on_resume, on_stop, on_submit_job, on_suspend,
};
use crate::internal::server::runloop::{control_loop, run_events};
use crate::platform::Platform;
use crate::{JobId, Map, NodeId};

/// Handle to a batch service. Cheap to clone, all clones share the same service.
#[derive(Clone)]
pub struct ServiceRef {
    core_ref: CoreRef,
    comm_ref: CommSenderRef,
}

impl ServiceRef {
    /// Creates a service that is driven explicitly through [`ServiceRef::run_until`]
    /// and [`ServiceRef::run_until_idle`].
    pub fn new(
        name: impl Into<String>,
        config: BatchConfig,
        nodes: Vec<ComputeNode>,
        platform: Box<dyn Platform>,
    ) -> crate::Result<Self> {
        Self::with_wakeup(name, config, nodes, platform, Rc::new(Notify::new()))
    }

    fn with_wakeup(
        name: impl Into<String>,
        config: BatchConfig,
        nodes: Vec<ComputeNode>,
        platform: Box<dyn Platform>,
        wakeup: Rc<Notify>,
    ) -> crate::Result<Self> {
        let core = Core::new(name.into(), config, nodes, platform)?;
        Ok(ServiceRef {
            core_ref: CoreRef::wrap(core),
            comm_ref: CommSenderRef::new(wakeup),
        })
    }

    pub fn name(&self) -> String {
        self.core_ref.get().name().to_string()
    }

    pub fn now(&self) -> SimTime {
        self.core_ref.get().now()
    }

    pub fn state(&self) -> ServiceState {
        self.core_ref.get().state()
    }

    pub fn set_client_events(&self, client_events: Box<dyn EventProcessor>) {
        self.comm_ref.set_client_events(client_events);
    }

    pub fn add_job(&self, job: Job) -> JobId {
        self.core_ref.get_mut().add_job(job)
    }

    /// `job` will not start before `parent` completes.
    pub fn add_parent_job(&self, job_id: JobId, parent: JobId) -> crate::Result<()> {
        self.add_job_dependency(parent, job_id)
    }

    /// `child` will not start before `job` completes.
    pub fn add_child_job(&self, job_id: JobId, child: JobId) -> crate::Result<()> {
        self.add_job_dependency(job_id, child)
    }

    fn add_job_dependency(&self, parent: JobId, child: JobId) -> crate::Result<()> {
        self.core_ref.get_mut().jobs_mut().add_dependency(parent, child)
    }

    /// Submits a job with service specific arguments (`-N`, `-c`, `-t`, ...).
    pub fn submit<I, K, V>(&self, job_id: JobId, args: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let request = BatchRequest::from_args(args)?;
        self.submit_request(job_id, request)
    }

    pub fn submit_request(&self, job_id: JobId, request: BatchRequest) -> crate::Result<()> {
        let mut core = self.core_ref.get_mut();
        let mut comm = self.comm_ref.get_mut();
        on_submit_job(&mut core, &mut *comm, job_id, request)?;
        if !core.events().is_empty() {
            comm.ask_for_processing();
        }
        Ok(())
    }

    pub fn cancel(&self, job_id: JobId) -> crate::Result<()> {
        log::debug!("Client asked for cancelling job {job_id}");
        let mut core = self.core_ref.get_mut();
        let mut comm = self.comm_ref.get_mut();
        on_cancel_job(&mut core, &mut *comm, job_id)
    }

    pub fn suspend(&self) -> crate::Result<()> {
        on_suspend(&mut self.core_ref.get_mut())
    }

    pub fn resume(&self) -> crate::Result<()> {
        let mut core = self.core_ref.get_mut();
        let mut comm = self.comm_ref.get_mut();
        on_resume(&mut core, &mut *comm)
    }

    pub fn stop(&self) {
        let mut core = self.core_ref.get_mut();
        let mut comm = self.comm_ref.get_mut();
        on_stop(&mut core, &mut *comm);
        comm.ask_for_processing();
    }

    /// Predicted start times of jobs if they were submitted now, keyed by label.
    pub fn get_start_time_estimates(
        &self,
        jobs: &[HypotheticalJob],
    ) -> crate::Result<Map<String, Option<SimTime>>> {
        on_estimate(&self.core_ref.get(), jobs)
    }

    /// Makes the node unavailable at time `at` (or now, if `at` has already passed).
    pub fn fail_node(&self, node_id: NodeId, at: SimTime) -> crate::Result<()> {
        self.schedule_node_event(node_id, at, Event::NodeFailed(node_id))
    }

    pub fn restore_node(&self, node_id: NodeId, at: SimTime) -> crate::Result<()> {
        self.schedule_node_event(node_id, at, Event::NodeRestored(node_id))
    }

    fn schedule_node_event(&self, node_id: NodeId, at: SimTime, event: Event) -> crate::Result<()> {
        let mut core = self.core_ref.get_mut();
        if core.ledger().node(node_id).is_none() {
            return Err(BatchError::InvalidArgument(format!(
                "Node {node_id} does not exist"
            )));
        }
        if core.state() == ServiceState::Down {
            return Err(crate::FailureCause::ServiceIsDown {
                service: core.name().to_string(),
            }
            .into());
        }
        let at = at.max(core.now());
        core.schedule_event(at, event);
        self.comm_ref.get_mut().ask_for_processing();
        Ok(())
    }

    /// Advances the simulation to `time`, processing every event up to it.
    pub fn run_until(&self, time: SimTime) -> usize {
        let mut core = self.core_ref.get_mut();
        let mut comm = self.comm_ref.get_mut();
        let processed = run_events(&mut core, &mut *comm, Some(time));
        if core.events().is_empty() {
            comm.reset_processing_flag();
        }
        processed
    }

    /// Processes events until none are left.
    pub fn run_until_idle(&self) -> usize {
        let mut core = self.core_ref.get_mut();
        let mut comm = self.comm_ref.get_mut();
        let processed = run_events(&mut core, &mut *comm, None);
        comm.reset_processing_flag();
        processed
    }

    pub fn job_state(&self, job_id: JobId) -> Option<JobState> {
        self.core_ref.get().jobs().find(job_id).map(|job| job.state())
    }

    pub fn with_job<F, R>(&self, job_id: JobId, f: F) -> Option<R>
    where
        F: FnOnce(&Job) -> R,
    {
        self.core_ref.get().jobs().find(job_id).map(f)
    }

    /// Jobs waiting in the batch queue, in queue order.
    pub fn queued_jobs(&self) -> Vec<QueuedJob> {
        self.core_ref.get().queue().iter().cloned().collect()
    }

    /// Records of finished jobs, in the order they finished.
    pub fn job_log(&self) -> Vec<JobRecord> {
        let core = self.core_ref.get();
        core.finished()
            .iter()
            .map(|job_id| JobRecord::from_job(core.get_job(*job_id)))
            .collect()
    }

    pub fn job_log_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.job_log())?)
    }

    pub fn sanity_check(&self) {
        self.core_ref.get().sanity_check();
    }
}

/// Creates a service together with the future that drives it.
///
/// Submissions made through the returned handle are processed by the future,
/// which finishes once the service is stopped.
pub fn service_start(
    name: impl Into<String>,
    config: BatchConfig,
    nodes: Vec<ComputeNode>,
    platform: Box<dyn Platform>,
) -> crate::Result<(ServiceRef, impl Future<Output = ()>)> {
    let wakeup = Rc::new(Notify::new());
    let service = ServiceRef::with_wakeup(name, config, nodes, platform, wakeup.clone())?;
    let future = control_loop(
        service.core_ref.clone(),
        service.comm_ref.clone(),
        wakeup,
    );
    Ok((service, future))
}
