use std::time::Duration;

use criterion::{BatchSize, BenchmarkId, Criterion};

use hpcbatch::internal::ledger::Ledger;
use hpcbatch::{ComputeNode, CoreAllocation, HostSelection, JobId, ResourceRequest};

fn create_ledger(node_count: u32, reservations: u32) -> Ledger {
    let nodes = (0..node_count)
        .map(|i| ComputeNode::new(format!("node{i}"), 32, 1 << 30))
        .collect();
    let mut ledger = Ledger::new(nodes, HostSelection::FirstFit, CoreAllocation::Requested);
    for job in 0..reservations {
        let request = ResourceRequest::new(1 + job % 4, 8 + job % 24);
        let duration = Duration::from_secs(60 + (job as u64 * 37) % 600);
        let _ = ledger.reserve_earliest(JobId::new(job), Duration::ZERO, &request, duration);
    }
    ledger
}

fn bench_earliest_window(c: &mut Criterion) {
    for node_count in [16, 128] {
        for reservations in [100, 1_000] {
            c.bench_with_input(
                BenchmarkId::new(
                    "earliest feasible window",
                    format!("nodes={node_count}, reservations={reservations}"),
                ),
                &(node_count, reservations),
                |b, &(node_count, reservations)| {
                    b.iter_batched_ref(
                        || create_ledger(node_count, reservations),
                        |ledger| {
                            ledger.earliest_feasible_window(
                                Duration::ZERO,
                                &ResourceRequest::new(node_count / 2, 16),
                                Duration::from_secs(300),
                            )
                        },
                        BatchSize::LargeInput,
                    );
                },
            );
        }
    }
}

fn bench_clone(c: &mut Criterion) {
    let ledger = create_ledger(128, 1_000);
    c.bench_function("clone ledger", |b| b.iter(|| ledger.clone()));
}

pub fn benchmark(c: &mut Criterion) {
    bench_earliest_window(c);
    bench_clone(c);
}
