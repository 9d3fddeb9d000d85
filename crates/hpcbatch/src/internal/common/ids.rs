use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

define_id_type!(JobId, u32);
define_id_type!(ActionId, u32);
define_id_type!(NodeId, u32);
define_id_type!(EventId, u64);

/// Globally identifies an action: the owning job and the action's index inside it.
#[derive(Default, Copy, Clone, Hash, PartialOrd, Ord, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    job_id: JobId,
    action_id: ActionId,
}

impl ActionRef {
    #[inline]
    pub fn new(job_id: JobId, action_id: ActionId) -> Self {
        Self { job_id, action_id }
    }

    #[inline]
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    #[inline]
    pub fn action_id(&self) -> ActionId {
        self.action_id
    }
}

impl Display for ActionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.job_id, self.action_id)
    }
}

impl Debug for ActionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
