//! Metrics aggregation tests
//!
//! Compares the aggregator against a straightforward reference quantile and
//! checks filtering, grouping and name resolution on hand-built logs.

#[path = "common/mod.rs"]
mod common;

use common::{event, worker_id, worker_table};
use mergebench::bench::{quantile, summarize_transfers, WorkerPair};
use mergebench::cluster::{ClusterResult, TransferEvent, WorkerId};
use mergebench::ClusterError;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Linear interpolation quantile, written independently of the aggregator
fn reference_quantile(values: &[f64], q: f64) -> f64 {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let pos = q * (v.len() - 1) as f64;
    let below = pos.floor() as usize;
    let frac = pos - below as f64;
    if below + 1 < v.len() {
        v[below] * (1.0 - frac) + v[below + 1] * frac
    } else {
        v[below]
    }
}

fn logs(
    entries: Vec<(usize, Vec<TransferEvent>)>,
) -> BTreeMap<WorkerId, ClusterResult<Vec<TransferEvent>>> {
    entries
        .into_iter()
        .map(|(receiver, events)| (worker_id(receiver), Ok(events)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: quantile agrees with the reference definition
    #[test]
    fn quantile_matches_reference(
        values in prop::collection::vec(0.0f64..1e9, 1..60),
        q in 0.0f64..=1.0,
    ) {
        let ours = quantile(&values, q).unwrap();
        let reference = reference_quantile(&values, q);
        prop_assert!((ours - reference).abs() <= 1e-6 * reference.abs().max(1.0));
    }

    /// Property: totals only include events at or above the threshold
    #[test]
    fn totals_respect_threshold(
        sizes in prop::collection::vec(1u64..10_000, 1..40),
        ignore_size in 0u64..10_000,
    ) {
        let events = sizes.iter().map(|&s| event(1, s, 0.5)).collect();
        let summary = summarize_transfers(&logs(vec![(0, events)]), &worker_table(2), ignore_size);

        let expected: u64 = sizes.iter().filter(|&&s| s >= ignore_size).sum();
        let pair = WorkerPair::new("worker-0", "worker-1");
        if expected == 0 {
            prop_assert!(summary.is_empty());
        } else {
            prop_assert_eq!(summary.total_bytes[&pair], expected);
        }
    }
}

#[test]
fn groups_by_receiver_and_sender_names() {
    let summary = summarize_transfers(
        &logs(vec![
            (0, vec![event(1, 1000, 1.0), event(2, 4000, 2.0)]),
            (1, vec![event(0, 3000, 1.0), event(0, 1000, 1.0)]),
        ]),
        &worker_table(3),
        0,
    );

    let pairs: Vec<String> = summary.bandwidth.keys().map(|p| p.to_string()).collect();
    assert_eq!(
        pairs,
        vec!["(worker-0,worker-1)", "(worker-0,worker-2)", "(worker-1,worker-0)"]
    );
    assert_eq!(
        summary.total_bytes[&WorkerPair::new("worker-1", "worker-0")],
        4000
    );
    assert_eq!(
        summary.bandwidth[&WorkerPair::new("worker-1", "worker-0")],
        [1500.0, 2000.0, 2500.0]
    );
    assert_eq!(
        summary.bandwidth[&WorkerPair::new("worker-0", "worker-2")],
        [2000.0; 3]
    );
}

#[test]
fn identical_logs_give_identical_summaries() {
    let build = || {
        logs(vec![
            (0, vec![event(1, 5000, 0.25), event(1, 7000, 0.5)]),
            (1, vec![event(0, 6000, 0.75)]),
        ])
    };
    let a = summarize_transfers(&build(), &worker_table(2), 1024);
    let b = summarize_transfers(&build(), &worker_table(2), 1024);
    assert_eq!(a, b);
}

#[test]
fn missing_worker_log_counts_as_empty() {
    let mut logs = logs(vec![(1, vec![event(0, 2048, 1.0)])]);
    logs.insert(
        worker_id(0),
        Err(ClusterError::worker_failed("tcp://host-0:9000", "gone")),
    );
    let summary = summarize_transfers(&logs, &worker_table(2), 0);
    assert_eq!(summary.len(), 1);
    assert_eq!(
        summary.total_bytes[&WorkerPair::new("worker-1", "worker-0")],
        2048
    );
}

#[test]
fn aggregate_reads_local_cluster_logs() {
    use mergebench::bench::{aggregate, build_dataset};
    use mergebench::datagen::{Role, DEFAULT_SEED};
    use mergebench::Dataset;

    let cluster = common::local_cluster(2);
    let build = build_dataset(&cluster, 400, 2, 0.3, Role::Build, true, DEFAULT_SEED).unwrap();
    build.persist().unwrap().wait().unwrap();

    let summary = aggregate(&cluster, 0).unwrap();
    let pairs: Vec<String> = summary.bandwidth.keys().map(|p| p.to_string()).collect();
    assert_eq!(pairs, vec!["(local-0,local-1)", "(local-1,local-0)"]);
    assert!(aggregate(&cluster, u64::MAX).unwrap().is_empty());
}
