use std::cmp::Reverse;

use priority_queue::PriorityQueue;

use crate::internal::common::Map;
use crate::internal::common::error::FailureCause;
use crate::internal::common::ids::{ActionRef, EventId, JobId, NodeId};
use crate::internal::common::time::SimTime;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Submission overhead elapsed, the job's actions may start.
    JobLaunch(JobId),
    ActionFinished {
        action: ActionRef,
        result: Result<(), FailureCause>,
    },
    WalltimeExpired(JobId),
    ReservationDue(JobId),
    NodeFailed(NodeId),
    NodeRestored(NodeId),
}

impl Event {
    /// Walltime timers go after everything else scheduled for the same instant,
    /// so work that ends exactly at the limit still completes.
    fn class(&self) -> u8 {
        match self {
            Event::WalltimeExpired(_) => 1,
            _ => 0,
        }
    }
}

type Priority = Reverse<(SimTime, u8, EventId)>;

/// Future event list ordered by simulated time.
///
/// Events of the same class and time are delivered in the order in which they were scheduled.
#[derive(Debug, Default)]
pub struct EventQueue {
    queue: PriorityQueue<EventId, Priority>,
    events: Map<EventId, Event>,
    id_counter: u64,
}

impl EventQueue {
    pub fn schedule(&mut self, time: SimTime, event: Event) -> EventId {
        self.id_counter += 1;
        let event_id = EventId::new(self.id_counter);
        self.queue.push(event_id, Reverse((time, event.class(), event_id)));
        self.events.insert(event_id, event);
        event_id
    }

    /// Removes a pending event. Cancelling a delivered event does nothing.
    pub fn cancel(&mut self, event_id: EventId) -> Option<Event> {
        self.queue.remove(&event_id);
        self.events.remove(&event_id)
    }

    pub fn peek_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|(_, Reverse((time, _, _)))| *time)
    }

    pub fn pop(&mut self) -> Option<(SimTime, Event)> {
        let (event_id, Reverse((time, _, _))) = self.queue.pop()?;
        let event = self.events.remove(&event_id)?;
        Some((time, event))
    }

    pub fn time_of(&self, event_id: EventId) -> Option<SimTime> {
        self.queue
            .get_priority(&event_id)
            .map(|Reverse((time, _, _))| *time)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
