#![deny(clippy::await_holding_refcell_ref)]

#[macro_use]
pub mod internal;

pub mod config;
pub mod control;
pub mod events;
pub mod gateway;
pub mod platform;

pub use crate::internal::common::WrappedRcRefCell;
pub use crate::internal::common::{Map, Set};

pub use crate::internal::common::error::{BatchError, FailureCause};
pub use crate::internal::common::ids::{ActionId, JobId, NodeId};
pub use crate::internal::common::time::SimTime;

pub use crate::internal::job::{
    ActionKind, ActionState, CustomAction, DataFile, FileLocation, Job, JobState,
};
pub use crate::internal::ledger::{
    ComputeNode, CoreAllocation, HostSelection, NodeAllocation, ResourceRequest,
};

pub type Error = BatchError;
pub type Result<T> = std::result::Result<T, Error>;

pub mod service {
    pub use crate::control::{ServiceRef, service_start};
    pub use crate::internal::scheduler::QueuedJob;
    pub use crate::internal::server::core::ServiceState;
}
