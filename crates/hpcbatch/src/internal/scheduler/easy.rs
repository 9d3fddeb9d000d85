use crate::internal::common::time::fmt_time;
use crate::internal::scheduler::decision::{DispatchDecision, SchedulingContext};

/// Aggressive (EASY) backfilling.
///
/// Jobs start in order while they fit. The first job that does not fit gets the only
/// reservation, and later jobs may start now if they fit around it.
#[derive(Debug, Default)]
pub struct EasyBackfillScheduler;

impl EasyBackfillScheduler {
    pub fn schedule(&mut self, ctx: &mut SchedulingContext) -> Vec<DispatchDecision> {
        ctx.ledger.release_reservations();

        let mut decisions = Vec::new();
        let mut jobs = ctx.queue.iter();
        let head = loop {
            let Some(job) = jobs.next() else {
                return decisions;
            };
            match ctx
                .ledger
                .allocate_now(job.job_id, ctx.now, &job.resources, job.requested_time)
            {
                Ok(nodes) => decisions.push(DispatchDecision::StartNow {
                    job_id: job.job_id,
                    nodes,
                }),
                Err(_) => break job,
            }
        };

        match ctx.ledger.reserve_earliest(
            head.job_id,
            ctx.now,
            &head.resources,
            head.requested_time,
        ) {
            Ok((start, nodes)) => {
                log::debug!(
                    "easy_bf: head job {} reserved at {}",
                    head.job_id,
                    fmt_time(start)
                );
                decisions.push(DispatchDecision::Reserve {
                    job_id: head.job_id,
                    start,
                    nodes,
                });
            }
            Err(_) => {
                log::debug!("easy_bf: head job {} cannot be placed", head.job_id);
            }
        }

        // The head reservation is in the ledger, a candidate that can be allocated
        // now cannot overlap it.
        for job in jobs {
            if let Ok(nodes) =
                ctx.ledger
                    .allocate_now(job.job_id, ctx.now, &job.resources, job.requested_time)
            {
                log::debug!(
                    "easy_bf: backfilling job {} at {}",
                    job.job_id,
                    fmt_time(ctx.now)
                );
                decisions.push(DispatchDecision::StartNow {
                    job_id: job.job_id,
                    nodes,
                });
            }
        }
        decisions
    }
}
