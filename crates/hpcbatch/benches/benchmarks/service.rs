use criterion::{BatchSize, BenchmarkId, Criterion};

use hpcbatch::config::{BatchConfigBuilder, SchedulingAlgorithm};
use hpcbatch::platform::SimulatedPlatform;
use hpcbatch::service::ServiceRef;
use hpcbatch::{ComputeNode, Job};

fn create_service(algorithm: SchedulingAlgorithm, job_count: u32) -> ServiceRef {
    let config = BatchConfigBuilder::default()
        .scheduling_algorithm(algorithm)
        .build()
        .unwrap();
    let nodes = (0..32)
        .map(|i| ComputeNode::new(format!("node{i}"), 16, 1 << 30))
        .collect();
    let service = ServiceRef::new("bench", config, nodes, Box::new(SimulatedPlatform::new(1e9)))
        .unwrap();
    for i in 0..job_count {
        let mut job = Job::new(format!("job{i}"));
        job.add_compute_action("compute", 1e10 * (1 + i % 7) as f64, 1, 16, 0);
        let job_id = service.add_job(job);
        let n_nodes = (1 + i % 8).to_string();
        let walltime = (60 + (i * 13) % 300).to_string();
        service
            .submit(job_id, [("-N", n_nodes.as_str()), ("-c", "16"), ("-t", walltime.as_str())])
            .unwrap();
    }
    service
}

fn bench_run(c: &mut Criterion) {
    for algorithm in [
        SchedulingAlgorithm::Fcfs,
        SchedulingAlgorithm::EasyBackfill,
        SchedulingAlgorithm::ConservativeBackfill,
    ] {
        for job_count in [100, 500] {
            c.bench_with_input(
                BenchmarkId::new(
                    "run to completion",
                    format!("{algorithm:?}, jobs={job_count}"),
                ),
                &job_count,
                |b, &job_count| {
                    b.iter_batched(
                        || create_service(algorithm, job_count),
                        |service| service.run_until_idle(),
                        BatchSize::SmallInput,
                    );
                },
            );
        }
    }
}

pub fn benchmark(c: &mut Criterion) {
    bench_run(c);
}
