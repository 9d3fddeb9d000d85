use std::collections::VecDeque;
use std::time::Duration;

use crate::internal::common::ids::{EventId, JobId};
use crate::internal::common::time::SimTime;
use crate::internal::ledger::ResourceRequest;

#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job_id: JobId,
    pub resources: ResourceRequest,
    /// Walltime plus submission overhead
    pub requested_time: Duration,
    pub submit_date: SimTime,
    pub reserved_start: Option<SimTime>,
    pub(crate) wakeup: Option<EventId>,
}

/// Pending jobs in submission order.
#[derive(Debug, Default)]
pub struct BatchQueue {
    jobs: VecDeque<QueuedJob>,
}

impl BatchQueue {
    pub fn push(&mut self, job: QueuedJob) {
        assert!(
            !self.contains(job.job_id),
            "job {} is already queued",
            job.job_id
        );
        self.jobs.push_back(job);
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.jobs.iter().any(|j| j.job_id == job_id)
    }

    pub fn get(&self, job_id: JobId) -> Option<&QueuedJob> {
        self.jobs.iter().find(|j| j.job_id == job_id)
    }

    pub fn get_mut(&mut self, job_id: JobId) -> Option<&mut QueuedJob> {
        self.jobs.iter_mut().find(|j| j.job_id == job_id)
    }

    pub fn remove(&mut self, job_id: JobId) -> Option<QueuedJob> {
        let index = self.jobs.iter().position(|j| j.job_id == job_id)?;
        self.jobs.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedJob> {
        self.jobs.iter()
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|j| j.job_id).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
