pub mod conservative;
pub mod decision;
pub mod easy;
pub mod estimator;
pub mod fcfs;
pub mod policy;
pub mod queue;

pub use decision::{AdminCommand, DispatchDecision, PolicyEvent, SchedulingContext};
pub use policy::SchedulingPolicy;
pub use queue::{BatchQueue, QueuedJob};
