use crate::config::{BatchConfigBuilder, SchedulingAlgorithm};
use crate::internal::job::JobState;
use crate::internal::tests::utils::env::TestEnv;
use crate::internal::tests::utils::job::sleep_job;
use crate::internal::tests::utils::secs;

fn easy_env(n_nodes: u32) -> TestEnv {
    let config = BatchConfigBuilder::default()
        .scheduling_algorithm(SchedulingAlgorithm::EasyBackfill)
        .build()
        .unwrap();
    TestEnv::new(config, n_nodes, 4)
}

#[test]
fn test_easy_backfill_does_not_delay_head() {
    let mut env = easy_env(2);
    let a = env.submit_job(sleep_job(100), 1, 1, 100);
    let head = env.submit_job(sleep_job(50), 2, 1, 50);
    let short = env.submit_job(sleep_job(100), 1, 1, 100);
    let long = env.submit_job(sleep_job(101), 1, 1, 101);

    let started: Vec<_> = env.comm.take_started(2).into_iter().map(|s| s.0).collect();
    assert_eq!(started, vec![a, short]);
    assert_eq!(
        env.core().queue().get(head).unwrap().reserved_start,
        Some(secs(100))
    );
    assert_eq!(env.core().queue().get(long).unwrap().reserved_start, None);

    env.run();
    assert_eq!(env.start_secs(head), Some(100.0));
    assert_eq!(env.start_secs(long), Some(150.0));
    assert_eq!(env.end_secs(long), Some(251.0));
    for job_id in [a, head, short, long] {
        assert_eq!(env.job_state(job_id), JobState::Completed);
    }
}

#[test]
fn test_easy_backfills_outside_of_head_reservation() {
    let mut env = easy_env(3);
    env.submit_job(sleep_job(100), 2, 1, 100);
    let head = env.submit_job(sleep_job(10), 2, 1, 10);
    let other = env.submit_job(sleep_job(1000), 1, 1, 1000);
    assert_eq!(env.start_secs(other), Some(0.0));

    env.run();
    assert_eq!(env.start_secs(head), Some(100.0));
}

#[test]
fn test_easy_starts_in_order_while_jobs_fit() {
    let mut env = easy_env(2);
    let a = env.submit_job(sleep_job(10), 1, 1, 10);
    let b = env.submit_job(sleep_job(10), 1, 1, 10);
    let c = env.submit_job(sleep_job(10), 2, 1, 10);
    assert_eq!(env.start_secs(a), Some(0.0));
    assert_eq!(env.start_secs(b), Some(0.0));
    env.run();
    assert_eq!(env.start_secs(c), Some(10.0));
    assert!(env.core().ledger().commitment(c).is_none());
}
