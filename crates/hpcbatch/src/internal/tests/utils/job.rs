use crate::internal::job::{DataFile, FileLocation, Job};
use crate::internal::tests::utils::secs;

/// Builds jobs for tests; actions are independent unless `chain` is called.
pub struct JobBuilder {
    job: Job,
    chained: bool,
}

impl JobBuilder {
    pub fn new(name: &str) -> JobBuilder {
        JobBuilder {
            job: Job::new(name),
            chained: false,
        }
    }

    pub fn sleep(mut self, duration: u64) -> JobBuilder {
        let n = self.job.actions().count();
        self.job.add_sleep_action(format!("sleep{n}"), secs(duration));
        self
    }

    pub fn compute(mut self, flops: f64, min_cores: u32, max_cores: u32) -> JobBuilder {
        let n = self.job.actions().count();
        self.job
            .add_compute_action(format!("compute{n}"), flops, min_cores, max_cores, 0);
        self
    }

    pub fn read(mut self, file: &str, storage: &str) -> JobBuilder {
        let n = self.job.actions().count();
        self.job.add_file_read_action(
            format!("read{n}"),
            DataFile::new(file, 0),
            FileLocation::new(storage, "/"),
        );
        self
    }

    pub fn write(mut self, file: &str, size: u64, storage: &str) -> JobBuilder {
        let n = self.job.actions().count();
        self.job.add_file_write_action(
            format!("write{n}"),
            DataFile::new(file, size),
            FileLocation::new(storage, "/"),
        );
        self
    }

    /// Every action depends on the one added before it.
    pub fn chain(mut self) -> JobBuilder {
        self.chained = true;
        self
    }

    pub fn build(mut self) -> Job {
        if self.chained {
            let ids: Vec<_> = self.job.actions().map(|(id, _)| id).collect();
            for pair in ids.windows(2) {
                self.job.add_parent_action(pair[1], pair[0]).unwrap();
            }
        }
        self.job
    }
}

pub fn sleep_job(duration: u64) -> Job {
    JobBuilder::new("sleep").sleep(duration).build()
}
