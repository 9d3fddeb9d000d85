use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::BatchRequest;
use crate::internal::common::error::{BatchError, FailureCause};
use crate::internal::common::ids::{ActionId, JobId};
use crate::internal::common::index::IndexVec;
use crate::internal::common::time::SimTime;
use crate::internal::job::action::{
    Action, ActionKind, ActionState, CustomAction, CustomWork, DataFile, FileLocation,
};
use crate::internal::job::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    NotSubmitted,
    Submitted,
    Completed,
    Discontinued,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Discontinued)
    }
}

/// A DAG of actions that runs inside one batch allocation.
#[derive(Clone)]
pub struct Job {
    pub(crate) id: JobId,
    name: String,
    actions: IndexVec<ActionId, Action>,
    graph: DependencyGraph<ActionId>,

    pub(crate) state: JobState,
    pub(crate) request: Option<BatchRequest>,
    pub(crate) failure_cause: Option<FailureCause>,
    pub(crate) submit_date: Option<SimTime>,
    pub(crate) start_date: Option<SimTime>,
    pub(crate) end_date: Option<SimTime>,
}

impl Debug for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Job {
            id: JobId::new(0),
            name: name.into(),
            actions: Default::default(),
            graph: Default::default(),
            state: JobState::NotSubmitted,
            request: None,
            failure_cause: None,
            submit_date: None,
            start_date: None,
            end_date: None,
        }
    }

    #[inline]
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn request(&self) -> Option<&BatchRequest> {
        self.request.as_ref()
    }

    pub fn failure_cause(&self) -> Option<&FailureCause> {
        self.failure_cause.as_ref()
    }

    pub fn submit_date(&self) -> Option<SimTime> {
        self.submit_date
    }

    pub fn start_date(&self) -> Option<SimTime> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<SimTime> {
        self.end_date
    }

    pub fn add_action(&mut self, name: impl Into<String>, kind: ActionKind) -> ActionId {
        self.actions.push(Action::new(name, kind))
    }

    pub fn add_compute_action(
        &mut self,
        name: impl Into<String>,
        flops: f64,
        min_cores: u32,
        max_cores: u32,
        ram: u64,
    ) -> ActionId {
        self.add_action(
            name,
            ActionKind::Compute {
                flops,
                min_cores,
                max_cores,
                ram,
            },
        )
    }

    pub fn add_sleep_action(&mut self, name: impl Into<String>, duration: Duration) -> ActionId {
        self.add_action(name, ActionKind::Sleep { duration })
    }

    pub fn add_file_read_action(
        &mut self,
        name: impl Into<String>,
        file: DataFile,
        location: FileLocation,
    ) -> ActionId {
        self.add_action(name, ActionKind::FileRead { file, location })
    }

    pub fn add_file_write_action(
        &mut self,
        name: impl Into<String>,
        file: DataFile,
        location: FileLocation,
    ) -> ActionId {
        self.add_action(name, ActionKind::FileWrite { file, location })
    }

    pub fn add_file_copy_action(
        &mut self,
        name: impl Into<String>,
        file: DataFile,
        src: FileLocation,
        dst: FileLocation,
    ) -> ActionId {
        self.add_action(name, ActionKind::FileCopy { file, src, dst })
    }

    pub fn add_file_delete_action(
        &mut self,
        name: impl Into<String>,
        file: DataFile,
        location: FileLocation,
    ) -> ActionId {
        self.add_action(name, ActionKind::FileDelete { file, location })
    }

    pub fn add_custom_action(
        &mut self,
        name: impl Into<String>,
        min_cores: u32,
        max_cores: u32,
        ram: u64,
        work: Rc<CustomWork>,
    ) -> ActionId {
        self.add_action(
            name,
            ActionKind::Custom(CustomAction {
                min_cores,
                max_cores,
                ram,
                work,
            }),
        )
    }

    fn check_action(&self, action_id: ActionId) -> crate::Result<()> {
        if self.actions.get(action_id).is_none() {
            return Err(BatchError::InvalidArgument(format!(
                "Job '{}' has no action {action_id}",
                self.name
            )));
        }
        Ok(())
    }

    fn add_action_dependency(&mut self, parent: ActionId, child: ActionId) -> crate::Result<()> {
        if self.state != JobState::NotSubmitted {
            return Err(BatchError::InvalidArgument(format!(
                "Job '{}' was already submitted",
                self.name
            )));
        }
        self.check_action(parent)?;
        self.check_action(child)?;
        self.graph.add_edge(parent, child)
    }

    pub fn add_parent_action(&mut self, action_id: ActionId, parent: ActionId) -> crate::Result<()> {
        self.add_action_dependency(parent, action_id)
    }

    pub fn add_child_action(&mut self, action_id: ActionId, child: ActionId) -> crate::Result<()> {
        self.add_action_dependency(action_id, child)
    }

    pub fn action(&self, action_id: ActionId) -> &Action {
        &self.actions[action_id]
    }

    pub(crate) fn action_mut(&mut self, action_id: ActionId) -> &mut Action {
        &mut self.actions[action_id]
    }

    pub fn actions(&self) -> impl Iterator<Item = (ActionId, &Action)> {
        self.actions.ids().zip(self.actions.iter())
    }

    pub fn action_graph(&self) -> &DependencyGraph<ActionId> {
        &self.graph
    }

    /// Actions that have not started yet and whose parents have all completed.
    pub fn ready_actions(&self) -> Vec<ActionId> {
        self.actions
            .ids()
            .filter(|&action_id| {
                self.actions[action_id].state == ActionState::NotStarted
                    && self
                        .graph
                        .parents(action_id)
                        .iter()
                        .all(|p| self.actions[*p].state == ActionState::Completed)
            })
            .collect()
    }

    pub fn running_actions(&self) -> Vec<ActionId> {
        self.actions
            .ids()
            .filter(|&action_id| self.actions[action_id].state == ActionState::Started)
            .collect()
    }

    pub fn all_actions_completed(&self) -> bool {
        self.actions
            .iter()
            .all(|a| a.state == ActionState::Completed)
    }

    /// Max of the minimal cores and of the memory over all actions.
    pub fn action_demands(&self) -> (u32, u64) {
        self.actions.iter().fold((0, 0), |(cores, ram), action| {
            let (min_cores, _, action_ram) = action.kind.requirements();
            (cores.max(min_cores), ram.max(action_ram))
        })
    }
}
