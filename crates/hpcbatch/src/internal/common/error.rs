use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::internal::common::ids::{JobId, NodeId};

/// Concrete reason why a submission was rejected or why an action/job ended unsuccessfully.
///
/// Every variant names the job and/or the service it originates from, so callers can
/// check that a failure points back to the right place.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    #[error("Compute service '{service}' does not have enough resources for job {job_id}")]
    NotEnoughResources { job_id: JobId, service: String },
    #[error("Service '{service}' is down")]
    ServiceIsDown { service: String },
    #[error("Service '{service}' is suspended")]
    ServiceIsSuspended { service: String },
    #[error("Service '{service}' does not support '{functionality}'")]
    FunctionalityNotAvailable {
        service: String,
        functionality: String,
    },
    #[error("File '{file}' not found at '{location}'")]
    FileNotFound { file: String, location: String },
    #[error("Storage service '{service}' has not enough space for file '{file}'")]
    StorageNotEnoughSpace { file: String, service: String },
    #[error("Host '{host}' ({node_id}) failed")]
    HostError { node_id: NodeId, host: String },
    #[error("Job {job_id} has timed out")]
    JobTimeout { job_id: JobId },
    #[error("Job {job_id} was killed by service '{service}'")]
    JobKilled { job_id: JobId, service: String },
    #[error("Job {job_id} cannot run, parent job {parent_id} was discontinued")]
    ParentJobDiscontinued { job_id: JobId, parent_id: JobId },
    #[error("Operation not allowed by service '{service}': {message}")]
    NotAllowed { service: String, message: String },
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Failure(#[from] FailureCause),
    #[error("Dependency cycle: {0}")]
    DependencyCycle(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Unknown job {0}")]
    UnknownJob(JobId),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

impl BatchError {
    /// Returns the failure cause if the error was produced by a service decision.
    pub fn failure_cause(&self) -> Option<&FailureCause> {
        match self {
            BatchError::Failure(cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<serde_json::error::Error> for BatchError {
    fn from(e: serde_json::error::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<String> for BatchError {
    fn from(e: String) -> Self {
        Self::GenericError(e)
    }
}

impl From<&str> for BatchError {
    fn from(e: &str) -> Self {
        Self::GenericError(e.to_string())
    }
}
