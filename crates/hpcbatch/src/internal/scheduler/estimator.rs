use std::time::Duration;

use crate::gateway::HypotheticalJob;
use crate::internal::common::Map;
use crate::internal::common::time::SimTime;
use crate::internal::ledger::Ledger;
use crate::internal::scheduler::policy::SchedulingPolicy;
use crate::internal::scheduler::queue::BatchQueue;

/// Predicts when hypothetical jobs would start if they were submitted at `now`.
///
/// Works on a private copy of the ledger, so the real schedule is never touched and
/// hypothetical jobs never see each other. `None` means the job can never start on the
/// currently available nodes.
pub fn estimate_start_times(
    policy: &SchedulingPolicy,
    ledger: &Ledger,
    queue: &BatchQueue,
    now: SimTime,
    overhead: Duration,
    jobs: &[HypotheticalJob],
) -> Map<String, Option<SimTime>> {
    let mut sandbox = ledger.clone();
    let not_before = match policy {
        SchedulingPolicy::Fcfs(_) => replay_queue_in_order(&mut sandbox, queue, now),
        _ => Some(now),
    };
    jobs.iter()
        .map(|job| {
            let duration = job.duration.saturating_add(overhead);
            let start = not_before.and_then(|not_before| {
                sandbox
                    .earliest_feasible_window(not_before, &job.resources, duration)
                    .map(|(start, _)| start)
            });
            log::debug!("Estimated start of '{}': {start:?}", job.label);
            (job.label.clone(), start)
        })
        .collect()
}

/// Places queued jobs one after another, none of them earlier than its predecessor.
/// Returns the start of the last one, or `None` if the queue is blocked forever.
fn replay_queue_in_order(
    sandbox: &mut Ledger,
    queue: &BatchQueue,
    now: SimTime,
) -> Option<SimTime> {
    let mut floor = now;
    for job in queue.iter() {
        let (start, _) = sandbox
            .reserve_earliest(job.job_id, floor, &job.resources, job.requested_time)
            .ok()?;
        floor = start;
    }
    Some(floor)
}
