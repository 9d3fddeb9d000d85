use crate::internal::common::time::SimTime;
use crate::internal::ledger::NodeAllocation;
use crate::{FailureCause, JobId};

/// Notifications sent to the submitter of jobs.
pub trait EventProcessor {
    fn on_job_started(&self, job_id: JobId, nodes: &[NodeAllocation], now: SimTime);
    fn on_job_completed(&self, job_id: JobId, now: SimTime);
    fn on_job_discontinued(&self, job_id: JobId, cause: &FailureCause, now: SimTime);
}
