use crate::config::SchedulingAlgorithm;
use crate::internal::ledger::HostSelection;
use crate::internal::scheduler::conservative::ConservativeBackfillScheduler;
use crate::internal::scheduler::decision::{DispatchDecision, PolicyEvent, SchedulingContext};
use crate::internal::scheduler::easy::EasyBackfillScheduler;
use crate::internal::scheduler::fcfs::FcfsScheduler;

/// The active scheduling algorithm of a service.
#[derive(Debug)]
pub enum SchedulingPolicy {
    Fcfs(FcfsScheduler),
    EasyBackfill(EasyBackfillScheduler),
    ConservativeBackfill(ConservativeBackfillScheduler),
}

impl SchedulingPolicy {
    pub fn new(algorithm: SchedulingAlgorithm) -> Self {
        match algorithm {
            SchedulingAlgorithm::Fcfs => SchedulingPolicy::Fcfs(Default::default()),
            SchedulingAlgorithm::EasyBackfill => SchedulingPolicy::EasyBackfill(Default::default()),
            SchedulingAlgorithm::ConservativeBackfill => {
                SchedulingPolicy::ConservativeBackfill(Default::default())
            }
        }
    }

    /// Creates a policy from its configuration name.
    pub fn from_name(name: &str) -> crate::Result<Self> {
        let algorithm: SchedulingAlgorithm = name
            .parse()
            .map_err(crate::internal::common::error::BatchError::ConfigurationError)?;
        Ok(Self::new(algorithm))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchedulingPolicy::Fcfs(_) => "fcfs",
            SchedulingPolicy::EasyBackfill(_) => "easy_bf",
            SchedulingPolicy::ConservativeBackfill(_) => "conservative_bf",
        }
    }

    pub fn on_event(
        &mut self,
        ctx: &mut SchedulingContext,
        event: PolicyEvent,
    ) -> Vec<DispatchDecision> {
        log::debug!("{}: {event:?}", self.name());
        match self {
            SchedulingPolicy::Fcfs(scheduler) => scheduler.schedule(ctx),
            SchedulingPolicy::EasyBackfill(scheduler) => scheduler.schedule(ctx),
            SchedulingPolicy::ConservativeBackfill(scheduler) => scheduler.on_event(ctx, event),
        }
    }

    /// Whether start times of queued jobs are fully determined by the ledger.
    ///
    /// Conservative backfilling reserves every queued job. FCFS is equivalent when
    /// nodes are picked first-fit, as the queue can be replayed in order.
    pub fn supports_estimates(&self, host_selection: HostSelection) -> bool {
        match self {
            SchedulingPolicy::ConservativeBackfill(_) => true,
            SchedulingPolicy::Fcfs(_) => host_selection == HostSelection::FirstFit,
            SchedulingPolicy::EasyBackfill(_) => false,
        }
    }
}
