use crate::internal::common::ids::{JobId, NodeId};
use crate::internal::common::time::SimTime;
use crate::internal::ledger::{Ledger, NodeSet};
use crate::internal::scheduler::queue::BatchQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Resume,
    Cancel(JobId),
    RestoreNode(NodeId),
}

/// Something that changed the queue or the resources since the policy was last consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEvent {
    JobSubmitted(JobId),
    /// The job completed and released its nodes.
    JobFinished(JobId),
    /// The job was discontinued while running and released its nodes.
    JobFailed(JobId),
    NodeFailed(NodeId),
    ClockAdvanced,
    Administrative(AdminCommand),
}

/// What the control loop has to do after consulting the policy.
/// The ledger is already updated when a decision is returned.
/// An empty decision list means no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchDecision {
    StartNow { job_id: JobId, nodes: NodeSet },
    Reserve {
        job_id: JobId,
        start: SimTime,
        nodes: NodeSet,
    },
}

/// State a policy works with: the clock, the ledger it may update and the pending queue.
pub struct SchedulingContext<'a> {
    pub now: SimTime,
    pub ledger: &'a mut Ledger,
    pub queue: &'a BatchQueue,
}
