use crate::internal::common::ids::JobId;
use crate::internal::common::time::fmt_time;
use crate::internal::ledger::CommitmentKind;
use crate::internal::scheduler::decision::{DispatchDecision, PolicyEvent, SchedulingContext};
use crate::internal::scheduler::queue::QueuedJob;

/// Conservative backfilling: every queued job holds a reservation.
///
/// A new job is placed at its earliest feasible window, which may be before jobs
/// submitted earlier if it fits into a hole without touching their reservations.
/// Jobs start when the clock reaches their reservation.
#[derive(Debug, Default)]
pub struct ConservativeBackfillScheduler;

impl ConservativeBackfillScheduler {
    pub fn on_event(
        &mut self,
        ctx: &mut SchedulingContext,
        event: PolicyEvent,
    ) -> Vec<DispatchDecision> {
        let queue = ctx.queue;
        let mut decisions = Vec::new();
        match event {
            PolicyEvent::JobSubmitted(job_id) => {
                if let Some(job) = queue.get(job_id) {
                    decisions.extend(reserve(ctx, job));
                }
            }
            PolicyEvent::ClockAdvanced => {}
            PolicyEvent::JobFinished(_)
            | PolicyEvent::JobFailed(_)
            | PolicyEvent::NodeFailed(_)
            | PolicyEvent::Administrative(_) => {
                decisions.extend(self.compact(ctx));
            }
        }
        decisions.extend(self.start_due_jobs(ctx));
        decisions
    }

    /// Moves reservations forward one job at a time, in queue order.
    ///
    /// Every other reservation stays in the ledger while a job is re-placed, and the
    /// job's own old window is free again, so no reservation ever moves later.
    fn compact(&mut self, ctx: &mut SchedulingContext) -> Vec<DispatchDecision> {
        let queue = ctx.queue;
        queue
            .iter()
            .filter_map(|job| {
                release_reservation(ctx, job.job_id);
                reserve(ctx, job)
            })
            .collect()
    }

    fn start_due_jobs(&mut self, ctx: &mut SchedulingContext) -> Vec<DispatchDecision> {
        let queue = ctx.queue;
        let mut decisions = Vec::new();
        for job in queue.iter() {
            let due = ctx.ledger.commitment(job.job_id).is_some_and(|c| {
                c.kind == CommitmentKind::Reservation && c.start <= ctx.now
            });
            if !due {
                continue;
            }
            release_reservation(ctx, job.job_id);
            match ctx
                .ledger
                .allocate_now(job.job_id, ctx.now, &job.resources, job.requested_time)
            {
                Ok(nodes) => {
                    log::debug!(
                        "conservative_bf: starting job {} at {}",
                        job.job_id,
                        fmt_time(ctx.now)
                    );
                    decisions.push(DispatchDecision::StartNow {
                        job_id: job.job_id,
                        nodes,
                    });
                }
                Err(_) => decisions.extend(reserve(ctx, job)),
            }
        }
        decisions
    }
}

fn release_reservation(ctx: &mut SchedulingContext, job_id: JobId) {
    if ctx
        .ledger
        .commitment(job_id)
        .is_some_and(|c| c.kind == CommitmentKind::Reservation)
    {
        ctx.ledger.release(job_id);
    }
}

fn reserve(ctx: &mut SchedulingContext, job: &QueuedJob) -> Option<DispatchDecision> {
    match ctx
        .ledger
        .reserve_earliest(job.job_id, ctx.now, &job.resources, job.requested_time)
    {
        Ok((start, nodes)) => {
            log::debug!(
                "conservative_bf: job {} reserved at {}",
                job.job_id,
                fmt_time(start)
            );
            Some(DispatchDecision::Reserve {
                job_id: job.job_id,
                start,
                nodes,
            })
        }
        Err(e) => {
            log::debug!(
                "conservative_bf: job {} cannot be reserved: {e}",
                job.job_id
            );
            None
        }
    }
}
