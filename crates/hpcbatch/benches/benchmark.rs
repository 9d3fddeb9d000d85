use criterion::{criterion_group, criterion_main};

mod benchmarks;

criterion_group!(ledger, benchmarks::ledger::benchmark);
criterion_group!(service, benchmarks::service::benchmark);

criterion_main!(ledger, service);
