use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::internal::common::ids::{JobId, NodeId};
use crate::internal::ledger::{
    ComputeNode, CoreAllocation, HostSelection, Ledger, LedgerError, NodeAllocation, NodeSet,
    ResourceRequest,
};
use crate::internal::tests::utils::secs;

fn ledger(cores: &[u32], host_selection: HostSelection, core_allocation: CoreAllocation) -> Ledger {
    let nodes = cores
        .iter()
        .enumerate()
        .map(|(i, c)| ComputeNode::new(format!("n{i}"), *c, 1000))
        .collect();
    Ledger::new(nodes, host_selection, core_allocation)
}

fn node_ids(nodes: &NodeSet) -> Vec<u32> {
    nodes.iter().map(|n| n.node_id.as_num()).collect()
}

#[test]
fn test_allocate_and_release() {
    let mut ledger = ledger(&[4, 4], HostSelection::FirstFit, CoreAllocation::Requested);
    let nodes = ledger
        .allocate_now(JobId::new(1), secs(0), &ResourceRequest::new(2, 2), secs(10))
        .unwrap();
    assert_eq!(node_ids(&nodes), vec![0, 1]);
    assert_eq!(nodes[0].cores, 2);
    assert_eq!(nodes[0].memory, 500);

    assert_eq!(
        ledger.try_allocate_now(secs(0), &ResourceRequest::new(2, 3), secs(10)),
        Err(LedgerError::Insufficient)
    );
    assert!(
        ledger
            .try_allocate_now(secs(0), &ResourceRequest::new(2, 2), secs(10))
            .is_ok()
    );
    assert!(
        ledger
            .try_allocate_now(secs(10), &ResourceRequest::new(2, 4), secs(10))
            .is_ok()
    );

    assert_eq!(
        ledger.allocate_now(JobId::new(1), secs(0), &ResourceRequest::new(1, 1), secs(1)),
        Err(LedgerError::AlreadyCommitted(JobId::new(1)))
    );

    assert!(ledger.release(JobId::new(1)).is_some());
    assert!(ledger.release(JobId::new(1)).is_none());
    assert!(
        ledger
            .try_allocate_now(secs(0), &ResourceRequest::new(2, 4), secs(10))
            .is_ok()
    );
    ledger.sanity_check();
}

#[test]
fn test_earliest_window_respects_reservations() {
    let mut ledger = ledger(&[4, 4], HostSelection::FirstFit, CoreAllocation::WholeNode);
    ledger
        .allocate_now(JobId::new(1), secs(0), &ResourceRequest::new(1, 1), secs(100))
        .unwrap();
    let (start, nodes) = ledger
        .reserve_earliest(JobId::new(2), secs(0), &ResourceRequest::new(2, 1), secs(50))
        .unwrap();
    assert_eq!(start, secs(100));
    assert_eq!(node_ids(&nodes), vec![0, 1]);

    // Fits exactly into the gap before the reservation
    let (start, nodes) = ledger
        .earliest_feasible_window(secs(0), &ResourceRequest::new(1, 1), secs(100))
        .unwrap();
    assert_eq!(start, secs(0));
    assert_eq!(node_ids(&nodes), vec![1]);

    let (start, _) = ledger
        .earliest_feasible_window(secs(0), &ResourceRequest::new(1, 1), secs(101))
        .unwrap();
    assert_eq!(start, secs(150));

    let (start, _) = ledger
        .earliest_feasible_window(secs(120), &ResourceRequest::new(1, 1), secs(1))
        .unwrap();
    assert_eq!(start, secs(150));

    assert!(
        ledger
            .earliest_feasible_window(secs(0), &ResourceRequest::new(3, 1), secs(1))
            .is_none()
    );
    ledger.sanity_check();
}

#[test]
fn test_release_reservations() {
    let mut ledger = ledger(&[4], HostSelection::FirstFit, CoreAllocation::WholeNode);
    let request = ResourceRequest::new(1, 4);
    ledger
        .allocate_now(JobId::new(1), secs(0), &request, secs(10))
        .unwrap();
    ledger
        .reserve_earliest(JobId::new(2), secs(0), &request, secs(10))
        .unwrap();
    ledger
        .reserve_earliest(JobId::new(3), secs(0), &request, secs(10))
        .unwrap();
    assert_eq!(ledger.commitment(JobId::new(3)).unwrap().start, secs(20));
    assert_eq!(
        ledger.release_reservations(),
        vec![JobId::new(2), JobId::new(3)]
    );
    assert!(ledger.commitment(JobId::new(3)).is_none());
    let on_node = ledger.timeline(NodeId::new(0)).commitments();
    assert_eq!(on_node.len(), 1);
    assert_eq!(on_node[0].job_id, JobId::new(1));
}

#[test]
fn test_overlapping_commitment_rejected() {
    let mut ledger = ledger(&[4], HostSelection::FirstFit, CoreAllocation::Requested);
    let nodes: NodeSet = [NodeAllocation {
        node_id: NodeId::new(0),
        cores: 3,
        memory: 10,
    }]
    .into_iter()
    .collect();
    ledger
        .reserve(JobId::new(1), nodes.clone(), secs(10), secs(20))
        .unwrap();
    ledger
        .reserve(JobId::new(2), nodes.clone(), secs(20), secs(30))
        .unwrap();
    assert_eq!(
        ledger.reserve(JobId::new(3), nodes, secs(15), secs(25)),
        Err(LedgerError::Overlap {
            job_id: JobId::new(3),
            node_id: NodeId::new(0)
        })
    );
    assert!(ledger.commitment(JobId::new(3)).is_none());
}

#[test]
fn test_memory_limits_placement() {
    let mut ledger = ledger(&[8, 8], HostSelection::FirstFit, CoreAllocation::Requested);
    let mut request = ResourceRequest::new(1, 1);
    request.memory_per_node = Some(700);
    ledger
        .allocate_now(JobId::new(1), secs(0), &request, secs(10))
        .unwrap();
    let nodes = ledger
        .allocate_now(JobId::new(2), secs(0), &request, secs(10))
        .unwrap();
    assert_eq!(node_ids(&nodes), vec![1]);
    assert!(
        ledger
            .try_allocate_now(secs(0), &request, secs(10))
            .is_err()
    );

    request.memory_per_node = Some(2000);
    assert_eq!(ledger.count_fitting_nodes(&request, false), 0);
}

#[test]
fn test_proportional_memory_of_huge_node() {
    let nodes = vec![ComputeNode::new("n0", 4, u64::MAX)];
    let mut ledger = Ledger::new(nodes, HostSelection::FirstFit, CoreAllocation::Requested);
    let request = ResourceRequest::new(1, 2);
    let nodes = ledger
        .allocate_now(JobId::new(1), secs(0), &request, secs(10))
        .unwrap();
    assert_eq!(nodes[0].cores, 2);
    assert_eq!(nodes[0].memory, u64::MAX / 2);
    assert!(ledger.try_allocate_now(secs(0), &request, secs(10)).is_ok());
    assert!(
        ledger
            .try_allocate_now(secs(0), &ResourceRequest::new(1, 3), secs(10))
            .is_err()
    );
}

#[test]
fn test_best_fit_selection() {
    let mut ledger = ledger(&[8, 4, 6], HostSelection::BestFit, CoreAllocation::Requested);
    let nodes = ledger
        .allocate_now(JobId::new(1), secs(0), &ResourceRequest::new(1, 2), secs(10))
        .unwrap();
    assert_eq!(node_ids(&nodes), vec![1]);
    let nodes = ledger
        .allocate_now(JobId::new(2), secs(0), &ResourceRequest::new(2, 2), secs(10))
        .unwrap();
    assert_eq!(node_ids(&nodes), vec![1, 2]);
}

#[test]
fn test_round_robin_selection() {
    let mut ledger = ledger(&[4, 4, 4], HostSelection::RoundRobin, CoreAllocation::Requested);
    let placed: Vec<u32> = (1..=4)
        .map(|i| {
            let nodes = ledger
                .allocate_now(JobId::new(i), secs(0), &ResourceRequest::new(1, 1), secs(10))
                .unwrap();
            nodes[0].node_id.as_num()
        })
        .collect();
    assert_eq!(placed, vec![0, 1, 2, 0]);
}

#[test]
fn test_down_node_is_skipped() {
    let mut ledger = ledger(&[4, 4], HostSelection::FirstFit, CoreAllocation::WholeNode);
    ledger.set_node_up(NodeId::new(0), false);
    let nodes = ledger
        .allocate_now(JobId::new(1), secs(0), &ResourceRequest::new(1, 1), secs(10))
        .unwrap();
    assert_eq!(node_ids(&nodes), vec![1]);
    assert!(
        ledger
            .earliest_feasible_window(secs(0), &ResourceRequest::new(2, 1), secs(1))
            .is_none()
    );
}

#[test]
fn test_random_commitments_never_overcommit() {
    let mut rng = SmallRng::seed_from_u64(0xb47c);
    for round in 0..20 {
        let cores: Vec<u32> = (0..rng.random_range(1..6))
            .map(|_| rng.random_range(1..16))
            .collect();
        let selection = match round % 3 {
            0 => HostSelection::FirstFit,
            1 => HostSelection::BestFit,
            _ => HostSelection::RoundRobin,
        };
        let mut ledger = ledger(&cores, selection, CoreAllocation::Requested);
        let max_cores = *cores.iter().max().unwrap();
        for job in 1..60 {
            let request = ResourceRequest::new(
                rng.random_range(1..=cores.len() as u32),
                rng.random_range(1..=max_cores),
            );
            let not_before = secs(rng.random_range(0..500));
            let duration = secs(rng.random_range(1..200));
            let _ = ledger.reserve_earliest(JobId::new(job), not_before, &request, duration);
            if rng.random_bool(0.1) {
                ledger.release(JobId::new(rng.random_range(1..=job)));
            }
        }
        ledger.sanity_check();
        for _ in 0..200 {
            let time = secs(rng.random_range(0..3000));
            for (index, node) in ledger.nodes().iter().enumerate() {
                let (used, _) = ledger.timeline(NodeId::new(index as u32)).usage_at(time);
                assert!(used <= node.cores);
            }
        }
    }
}
