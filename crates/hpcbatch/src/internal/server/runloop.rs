use std::rc::Rc;

use tokio::sync::Notify;

use crate::internal::common::time::{SimTime, fmt_time};
use crate::internal::server::comm::{Comm, CommSenderRef};
use crate::internal::server::core::{Core, CoreRef, ServiceState};
use crate::internal::server::reactor::process_event;

/// Processes events in time order. With `until`, the clock ends exactly there
/// and later events stay queued; without it everything runs to completion.
///
/// Returns the number of processed events.
pub fn run_events(core: &mut Core, comm: &mut impl Comm, until: Option<SimTime>) -> usize {
    let mut processed = 0;
    while let Some(time) = core.events().peek_time() {
        if until.is_some_and(|until| time > until) {
            break;
        }
        let Some((time, event)) = core.events_mut().pop() else {
            break;
        };
        core.advance_clock(time);
        log::trace!("{}: {event:?}", fmt_time(time));
        process_event(core, comm, event);
        processed += 1;
        if core.state() == ServiceState::Down {
            break;
        }
    }
    if let Some(until) = until {
        core.advance_clock(until);
    }
    processed
}

/// Drives the simulation whenever new work arrives, until the service goes down.
pub(crate) async fn control_loop(
    core_ref: CoreRef,
    comm_ref: CommSenderRef,
    wakeup: Rc<Notify>,
) {
    loop {
        wakeup.notified().await;
        let mut comm = comm_ref.get_mut();
        if !comm.get_processing_flag() {
            continue;
        }
        let mut core = core_ref.get_mut();
        let processed = run_events(&mut core, &mut *comm, None);
        comm.reset_processing_flag();
        log::debug!(
            "Control loop processed {processed} events, clock at {}",
            fmt_time(core.now())
        );
        if core.state() == ServiceState::Down {
            log::debug!("Service '{}' is down, control loop ends", core.name());
            break;
        }
    }
}
