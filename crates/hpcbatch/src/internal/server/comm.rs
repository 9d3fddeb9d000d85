use std::rc::Rc;

use tokio::sync::Notify;

use crate::events::EventProcessor;
use crate::internal::common::WrappedRcRefCell;
use crate::internal::common::time::SimTime;
use crate::internal::ledger::NodeAllocation;
use crate::{FailureCause, JobId};

pub trait Comm {
    /// New events are pending, the control loop should process them.
    fn ask_for_processing(&mut self);

    fn client(&mut self) -> &mut dyn EventProcessor;
}

/// Used until the submitter registers its own processor.
struct IgnoreEvents;

impl EventProcessor for IgnoreEvents {
    fn on_job_started(&self, _job_id: JobId, _nodes: &[NodeAllocation], _now: SimTime) {}
    fn on_job_completed(&self, _job_id: JobId, _now: SimTime) {}
    fn on_job_discontinued(&self, _job_id: JobId, _cause: &FailureCause, _now: SimTime) {}
}

pub struct CommSender {
    need_processing: bool,
    wakeup: Rc<Notify>,
    client_events: Box<dyn EventProcessor>,
}

pub type CommSenderRef = WrappedRcRefCell<CommSender>;

impl CommSenderRef {
    pub fn new(wakeup: Rc<Notify>) -> Self {
        WrappedRcRefCell::wrap(CommSender {
            need_processing: false,
            wakeup,
            client_events: Box::new(IgnoreEvents),
        })
    }

    pub fn set_client_events(&self, client_events: Box<dyn EventProcessor>) {
        self.get_mut().client_events = client_events;
    }
}

impl CommSender {
    pub fn reset_processing_flag(&mut self) {
        self.need_processing = false;
    }

    pub fn get_processing_flag(&self) -> bool {
        self.need_processing
    }
}

impl Comm for CommSender {
    fn ask_for_processing(&mut self) {
        if !self.need_processing {
            self.need_processing = true;
            self.wakeup.notify_one();
        }
    }

    #[inline]
    fn client(&mut self) -> &mut dyn EventProcessor {
        self.client_events.as_mut()
    }
}
