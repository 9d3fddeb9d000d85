pub mod action;
pub mod graph;
pub mod job;
pub mod jobmap;

pub use action::{Action, ActionKind, ActionState, CustomAction, DataFile, FileLocation};
pub use graph::DependencyGraph;
pub use job::{Job, JobState};
pub use jobmap::JobMap;
