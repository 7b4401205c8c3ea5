//! Shared fixtures for mergebench integration tests
//!
//! ```rust,ignore
//! #[path = "common/mod.rs"]
//! mod common;
//! ```

#![allow(dead_code)]

use std::collections::BTreeMap;

use mergebench::cluster::{LocalCluster, LocalClusterOptions, TransferEvent, WorkerId, WorkerInfo};
use mergebench::frame::Frame;
use mergebench::RunConfig;

/// In-process cluster with `n` workers and the memory pool enabled
pub fn local_cluster(n: usize) -> LocalCluster {
    LocalCluster::start(LocalClusterOptions {
        n_workers: n,
        memory_pool: true,
    })
    .unwrap()
}

/// Small, fast configuration; override fields with struct update syntax
pub fn small_config() -> RunConfig {
    RunConfig {
        chunk_size: 1_000,
        runs: 2,
        ignore_size: 0,
        ..Default::default()
    }
}

/// Values of `column`, panicking if it is absent
pub fn column(frame: &Frame, column: &str) -> Vec<i64> {
    frame
        .column(column)
        .unwrap_or_else(|| panic!("missing column {column}"))
        .to_vec()
}

/// Worker table with ids `tcp://host-i:900i` and names `worker-i`
pub fn worker_table(n: usize) -> BTreeMap<WorkerId, WorkerInfo> {
    (0..n)
        .map(|i| {
            let id = worker_id(i);
            (id.clone(), WorkerInfo::new(id, format!("worker-{i}")))
        })
        .collect()
}

pub fn worker_id(i: usize) -> WorkerId {
    WorkerId::new(format!("tcp://host-{i}:900{i}"))
}

/// Transfer event from worker `sender` of `total` bytes over `seconds`
pub fn event(sender: usize, total: u64, seconds: f64) -> TransferEvent {
    TransferEvent::new(worker_id(sender), total, seconds)
}
