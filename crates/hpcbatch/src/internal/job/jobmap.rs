use crate::internal::common::Map;
use crate::internal::common::error::BatchError;
use crate::internal::common::ids::JobId;
use crate::internal::job::graph::DependencyGraph;
use crate::internal::job::job::{Job, JobState};

/// All jobs known to a service together with the job-level dependency graph.
#[derive(Default, Debug)]
pub struct JobMap {
    jobs: Map<JobId, Job>,
    graph: DependencyGraph<JobId>,
    id_counter: u32,
}

impl JobMap {
    pub fn insert(&mut self, mut job: Job) -> JobId {
        self.id_counter += 1;
        let job_id = JobId::new(self.id_counter);
        job.id = job_id;
        self.jobs.insert(job_id, job);
        job_id
    }

    #[inline]
    pub fn find(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    #[inline]
    #[track_caller]
    pub fn get(&self, job_id: JobId) -> &Job {
        self.jobs
            .get(&job_id)
            .unwrap_or_else(|| panic!("Asking for invalid job id={job_id}"))
    }

    #[inline]
    #[track_caller]
    pub fn get_mut(&mut self, job_id: JobId) -> &mut Job {
        self.jobs
            .get_mut(&job_id)
            .unwrap_or_else(|| panic!("Asking for invalid job id={job_id}"))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn graph(&self) -> &DependencyGraph<JobId> {
        &self.graph
    }

    pub fn parents(&self, job_id: JobId) -> &[JobId] {
        self.graph.parents(job_id)
    }

    pub fn children(&self, job_id: JobId) -> &[JobId] {
        self.graph.children(job_id)
    }

    /// Adds a job-level dependency. The child must not be submitted yet.
    pub fn add_dependency(&mut self, parent: JobId, child: JobId) -> crate::Result<()> {
        let child_job = self.find(child).ok_or(BatchError::UnknownJob(child))?;
        if self.find(parent).is_none() {
            return Err(BatchError::UnknownJob(parent));
        }
        if child_job.state != JobState::NotSubmitted {
            return Err(BatchError::InvalidArgument(format!(
                "Job {child} was already submitted, its dependencies cannot change"
            )));
        }
        self.graph.add_edge(parent, child)
    }

    /// Parents that have not completed yet.
    pub fn pending_parents(&self, job_id: JobId) -> impl Iterator<Item = JobId> + '_ {
        self.parents(job_id)
            .iter()
            .copied()
            .filter(|p| self.get(*p).state != JobState::Completed)
    }

    pub fn discontinued_parent(&self, job_id: JobId) -> Option<JobId> {
        self.parents(job_id)
            .iter()
            .copied()
            .find(|p| self.get(*p).state == JobState::Discontinued)
    }
}
