//! Run loop
//!
//! Each run rebuilds both datasets sized to the live worker count,
//! materializes them, and hands the timing to the merge executor. Runs are
//! strictly sequential.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::dataset::build_dataset;
use super::merge::{execute, MergeStrategy};
use crate::cluster::{Cluster, Dataset};
use crate::config::RunConfig;
use crate::datagen::Role;
use crate::error::{MergeBenchError, Result};

/// Columns each side must expose once the shuffle label is gone
const EXPECTED_COLUMNS: usize = 2;

/// Outcome of one timed repetition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSample {
    /// Row count times row width, summed over both datasets
    pub bytes_processed: u64,
    pub elapsed_seconds: f64,
}

impl RunSample {
    /// Bytes per second, truncated to whole bytes
    pub fn throughput(&self) -> u64 {
        if self.elapsed_seconds > 0.0 {
            (self.bytes_processed as f64 / self.elapsed_seconds) as u64
        } else {
            0
        }
    }
}

/// Run one repetition
pub fn run_once<C: Cluster>(cluster: &C, config: &RunConfig, profile: bool) -> Result<RunSample> {
    let n_workers = cluster.worker_count()?;
    debug!(n_workers, chunk_size = config.chunk_size, "Building datasets");

    let build = build_dataset(
        cluster,
        config.chunk_size,
        n_workers,
        config.frac_match,
        Role::Build,
        config.shuffle,
        config.seed,
    )?
    .persist()?;
    let probe = build_dataset(
        cluster,
        config.chunk_size,
        n_workers,
        config.frac_match,
        Role::Probe,
        config.shuffle,
        config.seed,
    )?
    .persist()?;
    build.wait()?;
    probe.wait()?;
    cluster.wait_for_workers(n_workers)?;

    let mut bytes_processed = 0;
    for (side, dataset) in [("build", &build), ("probe", &probe)] {
        let columns = dataset.dtypes().len();
        if columns != EXPECTED_COLUMNS {
            return Err(MergeBenchError::precondition(format!(
                "{} dataset has {} columns, expected {}",
                side, columns, EXPECTED_COLUMNS
            )));
        }
        bytes_processed += dataset.len()? * dataset.dtypes().row_width() as u64;
    }

    let profile_path = if profile {
        config.profile.as_deref()
    } else {
        None
    };
    let elapsed_seconds = execute(
        cluster,
        MergeStrategy::from_config(config),
        &build,
        &probe,
        profile_path,
    )?;

    Ok(RunSample {
        bytes_processed,
        elapsed_seconds,
    })
}

/// Run `config.runs - 1` plain repetitions, then one profiled repetition
///
/// Samples are returned in execution order; the last one is the profiled run.
pub fn run_all<C: Cluster>(cluster: &C, config: &RunConfig) -> Result<Vec<RunSample>> {
    let mut samples = Vec::with_capacity(config.runs);
    for run in 0..config.runs {
        let profiled = run + 1 == config.runs && config.profiling();
        let sample = run_once(cluster, config, profiled)?;
        info!(
            run,
            profiled,
            elapsed_seconds = sample.elapsed_seconds,
            bytes = sample.bytes_processed,
            "Run complete"
        );
        samples.push(sample);
    }
    Ok(samples)
}
