//! Merge executor
//!
//! Times one materialization of the joined dataset under the configured
//! strategy. Only the persist-and-wait call is inside the timed region.

use std::path::Path;
use std::time::Instant;

use tracing::debug;

use crate::cluster::{Cluster, Dataset, JoinHow};
use crate::config::{Backend, RunConfig};
use crate::datagen::KEY_COLUMN;
use crate::error::Result;
use crate::profile::PerformanceReport;

/// How the two datasets are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Inner join declared on the dataset abstraction, optionally re-indexed on the key
    Generic { set_index: bool },
    /// The cluster's peer-to-peer join primitive
    Explicit,
}

impl MergeStrategy {
    pub fn from_config(config: &RunConfig) -> Self {
        match config.backend {
            Backend::Generic => MergeStrategy::Generic {
                set_index: config.set_index,
            },
            Backend::Explicit => MergeStrategy::Explicit,
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            MergeStrategy::Generic { .. } => Backend::Generic,
            MergeStrategy::Explicit => Backend::Explicit,
        }
    }
}

/// Join `build` with `probe` on the key column and return the seconds spent
/// materializing the result
///
/// When `profile` is given the materialization runs inside a
/// [`PerformanceReport`] scope that writes to that path.
pub fn execute<C: Cluster>(
    cluster: &C,
    strategy: MergeStrategy,
    build: &C::Dataset,
    probe: &C::Dataset,
    profile: Option<&Path>,
) -> Result<f64> {
    let joined = match strategy {
        MergeStrategy::Generic { set_index } => {
            let joined = build.merge(probe, KEY_COLUMN, JoinHow::Inner)?;
            if set_index {
                joined.set_index(KEY_COLUMN, None)?
            } else {
                joined
            }
        }
        MergeStrategy::Explicit => cluster.explicit_join(build, probe, KEY_COLUMN)?,
    };

    let elapsed = match profile {
        Some(path) => {
            let report = PerformanceReport::enter(cluster.profile_collector(), path);
            let elapsed = materialize(&joined)?;
            report.finish()?;
            elapsed
        }
        None => materialize(&joined)?,
    };
    debug!(backend = %strategy.backend(), elapsed, "Merge materialized");
    Ok(elapsed)
}

fn materialize<D: Dataset>(dataset: &D) -> Result<f64> {
    let started = Instant::now();
    dataset.persist()?.wait()?;
    Ok(started.elapsed().as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::dataset::build_dataset;
    use crate::cluster::{LocalCluster, LocalClusterOptions};
    use crate::datagen::{Role, DEFAULT_SEED};

    fn datasets(cluster: &LocalCluster) -> (crate::cluster::LocalDataset, crate::cluster::LocalDataset) {
        let build = build_dataset(cluster, 200, 2, 0.3, Role::Build, true, DEFAULT_SEED)
            .unwrap()
            .persist()
            .unwrap();
        let probe = build_dataset(cluster, 200, 2, 0.3, Role::Probe, true, DEFAULT_SEED)
            .unwrap()
            .persist()
            .unwrap();
        build.wait().unwrap();
        probe.wait().unwrap();
        (build, probe)
    }

    #[test]
    fn test_strategy_from_config() {
        let config = RunConfig {
            set_index: true,
            ..Default::default()
        };
        assert_eq!(
            MergeStrategy::from_config(&config),
            MergeStrategy::Generic { set_index: true }
        );
        let config = RunConfig {
            backend: Backend::Explicit,
            set_index: true,
            ..Default::default()
        };
        assert_eq!(MergeStrategy::from_config(&config), MergeStrategy::Explicit);
    }

    #[test]
    fn test_both_strategies_time_the_join() {
        let cluster = LocalCluster::start(LocalClusterOptions::default()).unwrap();
        let (build, probe) = datasets(&cluster);
        for strategy in [
            MergeStrategy::Generic { set_index: false },
            MergeStrategy::Generic { set_index: true },
            MergeStrategy::Explicit,
        ] {
            let elapsed = execute(&cluster, strategy, &build, &probe, None).unwrap();
            assert!(elapsed >= 0.0);
        }
    }

    #[test]
    fn test_profile_scope_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge-profile.json");
        let cluster = LocalCluster::start(LocalClusterOptions::default()).unwrap();
        let (build, probe) = datasets(&cluster);

        execute(&cluster, MergeStrategy::Explicit, &build, &probe, Some(&path)).unwrap();

        let artifact: crate::profile::ReportArtifact =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(artifact.task_count > 0);
        assert!(artifact
            .tasks
            .iter()
            .all(|t| t.key.starts_with("explicit-merge-")));
        assert!(!cluster.profile_collector().is_active());
    }
}
