use crate::internal::common::ids::JobId;
use crate::internal::common::time::SimTime;

/// Cores and memory held by one job on one node during `[start, finish)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment {
    pub job_id: JobId,
    pub start: SimTime,
    pub finish: SimTime,
    pub cores: u32,
    pub memory: u64,
}

impl Commitment {
    #[inline]
    fn is_active_at(&self, time: SimTime) -> bool {
        self.start <= time && time < self.finish
    }
}

/// Reservation table of a single node.
///
/// Allocations of running jobs and reservations of queued jobs are stored together,
/// the table only cares about the committed intervals.
#[derive(Debug, Clone, Default)]
pub struct NodeTimeline {
    commitments: Vec<Commitment>,
}

impl NodeTimeline {
    pub fn commitments(&self) -> &[Commitment] {
        &self.commitments
    }

    pub fn insert(&mut self, commitment: Commitment) {
        let index = self
            .commitments
            .partition_point(|c| c.start <= commitment.start);
        self.commitments.insert(index, commitment);
    }

    pub fn remove_job(&mut self, job_id: JobId) -> Option<Commitment> {
        let index = self.commitments.iter().position(|c| c.job_id == job_id)?;
        Some(self.commitments.remove(index))
    }

    /// Cores and memory committed at the given instant.
    pub fn usage_at(&self, time: SimTime) -> (u32, u64) {
        self.commitments
            .iter()
            .filter(|c| c.is_active_at(time))
            .fold((0, 0), |(cores, memory), c| {
                (cores + c.cores, memory.saturating_add(c.memory))
            })
    }

    /// Maximal cores and maximal memory committed at any instant of `[from, to)`.
    ///
    /// Usage only grows at commitment starts, so it is enough to look at `from`
    /// and at every start inside the window.
    pub fn peak_usage(&self, from: SimTime, to: SimTime) -> (u32, u64) {
        std::iter::once(from)
            .chain(
                self.commitments
                    .iter()
                    .map(|c| c.start)
                    .filter(|&start| start > from && start < to),
            )
            .map(|time| self.usage_at(time))
            .fold((0, 0), |(c1, m1), (c2, m2)| (c1.max(c2), m1.max(m2)))
    }

    /// Instants after `time` at which some commitment ends.
    pub fn finish_times_after(&self, time: SimTime) -> impl Iterator<Item = SimTime> + '_ {
        self.commitments
            .iter()
            .map(|c| c.finish)
            .filter(move |&finish| finish > time)
    }
}

#[cfg(test)]
mod tests {
    use super::{Commitment, NodeTimeline};
    use crate::internal::common::ids::JobId;
    use std::time::Duration;

    fn commitment(job_id: u32, start: u64, finish: u64, cores: u32) -> Commitment {
        Commitment {
            job_id: JobId::new(job_id),
            start: Duration::from_secs(start),
            finish: Duration::from_secs(finish),
            cores,
            memory: cores as u64 * 100,
        }
    }

    #[test]
    fn test_peak_usage() {
        let mut timeline = NodeTimeline::default();
        timeline.insert(commitment(1, 0, 10, 2));
        timeline.insert(commitment(2, 5, 20, 3));
        timeline.insert(commitment(3, 10, 30, 4));

        let s = Duration::from_secs;
        assert_eq!(timeline.peak_usage(s(0), s(5)), (2, 200));
        assert_eq!(timeline.peak_usage(s(0), s(6)), (5, 500));
        assert_eq!(timeline.peak_usage(s(10), s(30)), (7, 700));
        assert_eq!(timeline.peak_usage(s(20), s(40)), (4, 400));
        assert_eq!(timeline.peak_usage(s(30), s(40)), (0, 0));
    }

    #[test]
    fn test_remove_job() {
        let mut timeline = NodeTimeline::default();
        timeline.insert(commitment(1, 0, 10, 2));
        timeline.insert(commitment(2, 5, 20, 3));
        assert!(timeline.remove_job(JobId::new(1)).is_some());
        assert!(timeline.remove_job(JobId::new(1)).is_none());
        assert_eq!(timeline.commitments().len(), 1);
        assert_eq!(
            timeline
                .finish_times_after(Duration::from_secs(5))
                .collect::<Vec<_>>(),
            vec![Duration::from_secs(20)]
        );
    }
}
