use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::internal::common::error::FailureCause;
use crate::internal::common::ids::NodeId;
use crate::internal::common::time::SimTime;
use crate::platform::{ActionContext, Outcome, Platform};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataFile {
    pub name: String,
    /// Bytes
    pub size: u64,
}

impl DataFile {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        DataFile {
            name: name.into(),
            size,
        }
    }
}

/// A file location: storage service name and a path inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileLocation {
    pub storage: String,
    pub path: String,
}

impl FileLocation {
    pub fn new(storage: impl Into<String>, path: impl Into<String>) -> Self {
        FileLocation {
            storage: storage.into(),
            path: path.into(),
        }
    }
}

impl Display for FileLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.storage, self.path)
    }
}

pub type CustomWork = dyn Fn(&mut dyn Platform, &ActionContext) -> Outcome;

/// User-provided unit of work.
#[derive(Clone)]
pub struct CustomAction {
    pub min_cores: u32,
    pub max_cores: u32,
    pub ram: u64,
    pub work: Rc<CustomWork>,
}

impl Debug for CustomAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomAction")
            .field("min_cores", &self.min_cores)
            .field("max_cores", &self.max_cores)
            .field("ram", &self.ram)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    Compute {
        flops: f64,
        min_cores: u32,
        max_cores: u32,
        ram: u64,
    },
    Sleep {
        duration: Duration,
    },
    FileRead {
        file: DataFile,
        location: FileLocation,
    },
    FileWrite {
        file: DataFile,
        location: FileLocation,
    },
    FileCopy {
        file: DataFile,
        src: FileLocation,
        dst: FileLocation,
    },
    FileDelete {
        file: DataFile,
        location: FileLocation,
    },
    Custom(CustomAction),
}

impl ActionKind {
    /// (min cores, max cores, ram)
    pub fn requirements(&self) -> (u32, u32, u64) {
        match self {
            ActionKind::Compute {
                min_cores,
                max_cores,
                ram,
                ..
            } => (*min_cores, *max_cores, *ram),
            ActionKind::Custom(custom) => (custom.min_cores, custom.max_cores, custom.ram),
            _ => (0, 0, 0),
        }
    }

    pub fn flops(&self) -> f64 {
        match self {
            ActionKind::Compute { flops, .. } => *flops,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    NotStarted,
    Started,
    Completed,
    Failed,
    Killed,
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Completed | ActionState::Failed | ActionState::Killed
        )
    }
}

/// Where a started action runs inside its job's allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPlacement {
    pub node_id: NodeId,
    pub cores: u32,
    pub memory: u64,
}

#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    pub(crate) state: ActionState,
    pub(crate) placement: Option<ActionPlacement>,
    pub(crate) start_date: Option<SimTime>,
    pub(crate) end_date: Option<SimTime>,
    pub(crate) failure_cause: Option<FailureCause>,
}

impl Action {
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Action {
            name: name.into(),
            kind,
            state: ActionState::NotStarted,
            placement: None,
            start_date: None,
            end_date: None,
            failure_cause: None,
        }
    }

    #[inline]
    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn start_date(&self) -> Option<SimTime> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<SimTime> {
        self.end_date
    }

    pub fn failure_cause(&self) -> Option<&FailureCause> {
        self.failure_cause.as_ref()
    }

    pub fn placement(&self) -> Option<&ActionPlacement> {
        self.placement.as_ref()
    }

    pub(crate) fn set_started(&mut self, now: SimTime, placement: ActionPlacement) {
        assert_eq!(self.state, ActionState::NotStarted);
        self.state = ActionState::Started;
        self.start_date = Some(now);
        self.placement = Some(placement);
    }

    pub(crate) fn set_completed(&mut self, now: SimTime) {
        assert_eq!(self.state, ActionState::Started);
        self.state = ActionState::Completed;
        self.end_date = Some(now);
    }

    /// `state` is `Failed` or `Killed`.
    pub(crate) fn set_terminated(&mut self, now: SimTime, state: ActionState, cause: FailureCause) {
        assert_eq!(self.state, ActionState::Started);
        self.state = state;
        self.end_date = Some(now);
        self.failure_cause = Some(cause);
    }
}
