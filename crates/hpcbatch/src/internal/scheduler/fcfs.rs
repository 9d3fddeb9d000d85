use crate::internal::common::time::fmt_time;
use crate::internal::scheduler::decision::{DispatchDecision, SchedulingContext};

/// Starts jobs strictly in submission order.
///
/// Once the head of the queue does not fit, nothing behind it is considered.
#[derive(Debug, Default)]
pub struct FcfsScheduler;

impl FcfsScheduler {
    pub fn schedule(&mut self, ctx: &mut SchedulingContext) -> Vec<DispatchDecision> {
        let mut decisions = Vec::new();
        for job in ctx.queue.iter() {
            match ctx
                .ledger
                .allocate_now(job.job_id, ctx.now, &job.resources, job.requested_time)
            {
                Ok(nodes) => decisions.push(DispatchDecision::StartNow {
                    job_id: job.job_id,
                    nodes,
                }),
                Err(_) => {
                    log::debug!(
                        "fcfs: job {} blocks the queue at {}",
                        job.job_id,
                        fmt_time(ctx.now)
                    );
                    break;
                }
            }
        }
        decisions
    }
}
