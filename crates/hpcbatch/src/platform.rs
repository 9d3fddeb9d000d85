//! Interface to the simulated hardware that actions run on.

use std::time::Duration;

use crate::internal::common::error::{BatchError, FailureCause};
use crate::internal::common::time::SimTime;
use crate::internal::job::{DataFile, FileLocation};
use crate::internal::ledger::ComputeNode;
use crate::{JobId, Map};

/// What a started operation will do: how long it takes and whether it ends well.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub duration: Duration,
    pub result: Result<(), FailureCause>,
}

impl Outcome {
    pub fn success(duration: Duration) -> Self {
        Outcome {
            duration,
            result: Ok(()),
        }
    }

    pub fn failure(duration: Duration, cause: FailureCause) -> Self {
        Outcome {
            duration,
            result: Err(cause),
        }
    }
}

/// Information about the placement of an action, passed to custom actions.
pub struct ActionContext<'a> {
    pub job_id: JobId,
    pub node: &'a ComputeNode,
    pub cores: u32,
    pub now: SimTime,
}

/// Compute, network and storage model.
///
/// Operations are only started here, the service schedules their completion after
/// `Outcome::duration` of simulated time.
pub trait Platform {
    fn compute(&mut self, node: &ComputeNode, cores: u32, flops: f64) -> Outcome;
    fn transfer_time(&self, src: &str, dst: &str, bytes: u64) -> Duration;
    fn read_file(&mut self, file: &DataFile, location: &FileLocation, node: &ComputeNode)
    -> Outcome;
    fn write_file(
        &mut self,
        file: &DataFile,
        location: &FileLocation,
        node: &ComputeNode,
    ) -> Outcome;
    fn copy_file(&mut self, file: &DataFile, src: &FileLocation, dst: &FileLocation) -> Outcome;
    fn delete_file(&mut self, file: &DataFile, location: &FileLocation) -> Outcome;
}

#[derive(Debug, Default)]
struct Storage {
    capacity: u64,
    used: u64,
    files: Map<(String, String), u64>,
}

/// Homogeneous cluster with a flat network and capacity-limited storage services.
///
/// File effects (creation, deletion) are applied when the operation starts.
#[derive(Debug)]
pub struct SimulatedPlatform {
    /// flop/s of a single core
    core_speed: f64,
    latency: Duration,
    /// bytes/s
    bandwidth: f64,
    storages: Map<String, Storage>,
}

impl SimulatedPlatform {
    pub fn new(core_speed: f64) -> Self {
        SimulatedPlatform {
            core_speed,
            latency: Duration::ZERO,
            bandwidth: f64::INFINITY,
            storages: Default::default(),
        }
    }

    pub fn with_network(mut self, latency: Duration, bandwidth: f64) -> Self {
        self.latency = latency;
        self.bandwidth = bandwidth;
        self
    }

    pub fn add_storage(&mut self, name: impl Into<String>, capacity: u64) {
        self.storages.insert(
            name.into(),
            Storage {
                capacity,
                ..Default::default()
            },
        );
    }

    /// Places a file on a storage service before the simulation starts.
    pub fn add_file(&mut self, file: &DataFile, location: &FileLocation) -> crate::Result<()> {
        let Some(storage) = self.storages.get_mut(&location.storage) else {
            return Err(BatchError::InvalidArgument(format!(
                "Unknown storage service '{}'",
                location.storage
            )));
        };
        store(storage, file, location)?;
        Ok(())
    }

    pub fn has_file(&self, file: &DataFile, location: &FileLocation) -> bool {
        self.storages
            .get(&location.storage)
            .is_some_and(|s| s.files.contains_key(&file_key(file, location)))
    }

    pub fn free_space(&self, storage: &str) -> Option<u64> {
        self.storages.get(storage).map(|s| s.capacity - s.used)
    }

    fn lookup(&self, file: &DataFile, location: &FileLocation) -> Result<u64, FailureCause> {
        self.storages
            .get(&location.storage)
            .and_then(|s| s.files.get(&file_key(file, location)).copied())
            .ok_or_else(|| FailureCause::FileNotFound {
                file: file.name.clone(),
                location: location.to_string(),
            })
    }
}

/// Zero speed or bandwidth gives an infinite time, the operation then never ends
/// and only the walltime of its job stops it.
fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

fn file_key(file: &DataFile, location: &FileLocation) -> (String, String) {
    (location.path.clone(), file.name.clone())
}

fn store(storage: &mut Storage, file: &DataFile, location: &FileLocation) -> Result<(), FailureCause> {
    let key = file_key(file, location);
    let old_size = storage.files.get(&key).copied().unwrap_or(0);
    if file.size > storage.capacity - (storage.used - old_size) {
        return Err(FailureCause::StorageNotEnoughSpace {
            file: file.name.clone(),
            service: location.storage.clone(),
        });
    }
    storage.used = storage.used - old_size + file.size;
    storage.files.insert(key, file.size);
    Ok(())
}

impl Platform for SimulatedPlatform {
    fn compute(&mut self, _node: &ComputeNode, cores: u32, flops: f64) -> Outcome {
        let secs = flops / (self.core_speed * cores.max(1) as f64);
        Outcome::success(secs_to_duration(secs))
    }

    fn transfer_time(&self, _src: &str, _dst: &str, bytes: u64) -> Duration {
        let secs = bytes as f64 / self.bandwidth;
        self.latency.saturating_add(secs_to_duration(secs))
    }

    fn read_file(
        &mut self,
        file: &DataFile,
        location: &FileLocation,
        node: &ComputeNode,
    ) -> Outcome {
        match self.lookup(file, location) {
            Ok(size) => Outcome::success(self.transfer_time(&location.storage, &node.name, size)),
            Err(cause) => Outcome::failure(self.latency, cause),
        }
    }

    fn write_file(
        &mut self,
        file: &DataFile,
        location: &FileLocation,
        node: &ComputeNode,
    ) -> Outcome {
        let duration = self.transfer_time(&node.name, &location.storage, file.size);
        let result = match self.storages.get_mut(&location.storage) {
            Some(storage) => store(storage, file, location),
            None => Err(FailureCause::StorageNotEnoughSpace {
                file: file.name.clone(),
                service: location.storage.clone(),
            }),
        };
        match result {
            Ok(()) => Outcome::success(duration),
            Err(cause) => Outcome::failure(self.latency, cause),
        }
    }

    fn copy_file(&mut self, file: &DataFile, src: &FileLocation, dst: &FileLocation) -> Outcome {
        let size = match self.lookup(file, src) {
            Ok(size) => size,
            Err(cause) => return Outcome::failure(self.latency, cause),
        };
        let copied = DataFile::new(file.name.clone(), size);
        let result = match self.storages.get_mut(&dst.storage) {
            Some(storage) => store(storage, &copied, dst),
            None => Err(FailureCause::StorageNotEnoughSpace {
                file: file.name.clone(),
                service: dst.storage.clone(),
            }),
        };
        match result {
            Ok(()) => Outcome::success(self.transfer_time(&src.storage, &dst.storage, size)),
            Err(cause) => Outcome::failure(self.latency, cause),
        }
    }

    fn delete_file(&mut self, file: &DataFile, location: &FileLocation) -> Outcome {
        let key = file_key(file, location);
        let removed = self
            .storages
            .get_mut(&location.storage)
            .and_then(|s| s.files.remove(&key).map(|size| (s, size)));
        match removed {
            Some((storage, size)) => {
                storage.used -= size;
                Outcome::success(self.latency)
            }
            None => Outcome::failure(
                self.latency,
                FailureCause::FileNotFound {
                    file: file.name.clone(),
                    location: location.to_string(),
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Platform, SimulatedPlatform};
    use crate::FailureCause;
    use crate::internal::job::{DataFile, FileLocation};
    use crate::internal::ledger::ComputeNode;
    use std::time::Duration;

    #[test]
    fn test_compute_time() {
        let mut platform = SimulatedPlatform::new(100.0);
        let node = ComputeNode::new("n0", 4, 1000);
        let outcome = platform.compute(&node, 4, 2000.0);
        assert_eq!(outcome.duration, Duration::from_secs(5));
        assert!(outcome.result.is_ok());
    }

    #[test]
    fn test_zero_speed_never_finishes() {
        let node = ComputeNode::new("n0", 4, 1000);
        let mut platform = SimulatedPlatform::new(0.0);
        assert_eq!(platform.compute(&node, 2, 10.0).duration, Duration::MAX);
        assert_eq!(platform.compute(&node, 2, 0.0).duration, Duration::ZERO);

        let platform =
            SimulatedPlatform::new(1.0).with_network(Duration::from_secs(1), 0.0);
        assert_eq!(platform.transfer_time("a", "b", 100), Duration::MAX);
        assert_eq!(platform.transfer_time("a", "b", 0), Duration::from_secs(1));
    }

    #[test]
    fn test_storage_operations() {
        let mut platform = SimulatedPlatform::new(1.0).with_network(Duration::from_secs(1), 100.0);
        platform.add_storage("ss", 1000);
        let node = ComputeNode::new("n0", 4, 1000);
        let file = DataFile::new("f", 600);
        let loc = FileLocation::new("ss", "/");

        let outcome = platform.read_file(&file, &loc, &node);
        assert!(matches!(outcome.result, Err(FailureCause::FileNotFound { .. })));
        assert_eq!(outcome.duration, Duration::from_secs(1));

        let outcome = platform.write_file(&file, &loc, &node);
        assert_eq!(outcome.duration, Duration::from_secs(7));
        assert!(platform.has_file(&file, &loc));
        assert_eq!(platform.free_space("ss"), Some(400));

        let other = FileLocation::new("ss", "/copy");
        let outcome = platform.copy_file(&file, &loc, &other);
        assert!(matches!(
            outcome.result,
            Err(FailureCause::StorageNotEnoughSpace { .. })
        ));

        assert!(platform.delete_file(&file, &loc).result.is_ok());
        assert!(platform.delete_file(&file, &loc).result.is_err());
        assert_eq!(platform.free_space("ss"), Some(1000));
    }
}
