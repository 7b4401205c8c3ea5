//! Benchmark driver
//!
//! - `dataset` - lazy build/probe dataset declaration
//! - `merge` - timed materialization of the join
//! - `runner` - sequential repetitions
//! - `metrics` - transfer log aggregation
//! - `report` - text rendering
//!
//! [`run_benchmark`] ties these together against any [`Cluster`].

pub mod dataset;
pub mod merge;
pub mod metrics;
pub mod report;
pub mod runner;

pub use dataset::build_dataset;
pub use merge::{execute, MergeStrategy};
pub use metrics::{aggregate, quantile, summarize_transfers, TransferSummary, WorkerPair};
pub use report::render;
pub use runner::{run_all, run_once, RunSample};

use serde::Serialize;
use tracing::{info, warn};

use crate::cluster::{Cluster, TransportConfig};
use crate::config::RunConfig;
use crate::error::Result;

/// Everything the report needs
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResults {
    /// One sample per run, in execution order
    pub samples: Vec<RunSample>,
    pub protocol: String,
    pub n_workers: usize,
    pub transport: TransportConfig,
    /// Transfer statistics accumulated over all runs
    pub transfers: TransferSummary,
}

/// Run every repetition, then collect transfer statistics and cluster details
pub fn run_benchmark<C: Cluster>(cluster: &C, config: &RunConfig) -> Result<BenchmarkResults> {
    info!(
        backend = %config.backend,
        runs = config.runs,
        chunk_size = config.chunk_size,
        "Starting merge benchmark"
    );
    let samples = run_all(cluster, config)?;
    let transfers = aggregate(cluster, config.ignore_size)?;
    let n_workers = cluster.worker_count()?;

    let transport = cluster
        .run(|worker| worker.transport_config())?
        .into_values()
        .find_map(|reported| reported.ok())
        .unwrap_or_else(|| {
            warn!("No worker reported a transport configuration");
            TransportConfig::default()
        });

    Ok(BenchmarkResults {
        samples,
        protocol: cluster.protocol().to_string(),
        n_workers,
        transport,
        transfers,
    })
}
