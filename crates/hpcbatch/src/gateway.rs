use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::internal::common::error::{BatchError, FailureCause};
use crate::internal::common::time::SimTime;
use crate::internal::job::{Job, JobState};
use crate::internal::ledger::ResourceRequest;
use crate::{JobId, Map};

/// Shape and time limit of a batch job submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub resources: ResourceRequest,
    pub walltime: Duration,
}

impl BatchRequest {
    pub fn new(n_nodes: u32, cores_per_node: u32, walltime: Duration) -> Self {
        BatchRequest {
            resources: ResourceRequest::new(n_nodes, cores_per_node),
            walltime,
        }
    }

    pub fn with_memory(mut self, memory_per_node: u64) -> Self {
        self.resources.memory_per_node = Some(memory_per_node);
        self
    }

    /// Parses service specific arguments.
    ///
    /// Recognized flags: `-N` node count, `-c` cores per node, `-t` walltime in seconds
    /// (all required and positive), `--mem` bytes per node and `-u` user name (ignored).
    pub fn from_args<I, K, V>(args: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut values: Map<String, String> = Map::new();
        for (key, value) in args {
            let key = key.as_ref();
            match key {
                "-N" | "-c" | "-t" | "--mem" | "-u" => {
                    values.insert(key.to_string(), value.as_ref().to_string());
                }
                _ => {
                    return Err(BatchError::InvalidArgument(format!(
                        "Unknown service specific argument '{key}'"
                    )));
                }
            }
        }
        let n_nodes = parse_positive(&values, "-N")?;
        let cores_per_node = parse_positive(&values, "-c")?;
        let walltime = parse_positive(&values, "-t")?;
        let mut request = BatchRequest::new(
            n_nodes as u32,
            cores_per_node as u32,
            Duration::from_secs(walltime),
        );
        if values.contains_key("--mem") {
            request = request.with_memory(parse_positive(&values, "--mem")?);
        }
        Ok(request)
    }

    /// Node count, cores per node, walltime and an explicit memory request must be positive.
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = if self.resources.n_nodes == 0 {
            Some("node count")
        } else if self.resources.cores_per_node == 0 {
            Some("cores per node")
        } else if self.walltime.is_zero() {
            Some("walltime")
        } else if self.resources.memory_per_node == Some(0) {
            Some("memory per node")
        } else {
            None
        };
        match invalid {
            Some(what) => Err(BatchError::InvalidArgument(format!(
                "The {what} of a batch job must be positive"
            ))),
            None => Ok(()),
        }
    }

    /// Time the job holds its nodes: walltime plus the dispatch overhead.
    pub fn requested_time(&self, overhead: Duration) -> Duration {
        self.walltime.saturating_add(overhead)
    }
}

fn parse_positive(values: &Map<String, String>, key: &str) -> crate::Result<u64> {
    let value = values.get(key).ok_or_else(|| {
        BatchError::InvalidArgument(format!("Missing service specific argument '{key}'"))
    })?;
    match value.trim().parse::<u64>() {
        Ok(0) => Err(BatchError::InvalidArgument(format!(
            "Argument '{key}' must be positive"
        ))),
        Ok(v) if key != "--mem" && v > u32::MAX as u64 => Err(BatchError::InvalidArgument(
            format!("Argument '{key}' is too large"),
        )),
        Ok(v) => Ok(v),
        Err(_) => Err(BatchError::InvalidArgument(format!(
            "Invalid value '{value}' for argument '{key}'"
        ))),
    }
}

/// Job shape used for start time predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HypotheticalJob {
    pub label: String,
    pub resources: ResourceRequest,
    pub duration: Duration,
}

impl HypotheticalJob {
    pub fn new(
        label: impl Into<String>,
        n_nodes: u32,
        cores_per_node: u32,
        duration: Duration,
    ) -> Self {
        HypotheticalJob {
            label: label.into(),
            resources: ResourceRequest::new(n_nodes, cores_per_node),
            duration,
        }
    }
}

/// Summary of a finished job, suitable for job logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub job_id: JobId,
    pub name: String,
    pub n_nodes: u32,
    pub cores_per_node: u32,
    pub walltime: f64,
    pub submit_date: Option<f64>,
    pub start_date: Option<f64>,
    pub end_date: Option<f64>,
    pub state: JobState,
    pub failure_cause: Option<FailureCause>,
}

impl JobRecord {
    pub(crate) fn from_job(job: &Job) -> Self {
        let secs = |time: Option<SimTime>| time.map(|t| t.as_secs_f64());
        let (n_nodes, cores_per_node, walltime) = job
            .request()
            .map(|r| {
                (
                    r.resources.n_nodes,
                    r.resources.cores_per_node,
                    r.walltime.as_secs_f64(),
                )
            })
            .unwrap_or_default();
        JobRecord {
            job_id: job.id(),
            name: job.name().to_string(),
            n_nodes,
            cores_per_node,
            walltime,
            submit_date: secs(job.submit_date()),
            start_date: secs(job.start_date()),
            end_date: secs(job.end_date()),
            state: job.state(),
            failure_cause: job.failure_cause().cloned(),
        }
    }
}
