#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # mergebench
//!
//! A benchmark for distributed equal-joins. Two synthetic datasets, a build
//! side and a probe side, are generated across the workers of a cluster and
//! joined on an integer key. The run is timed and the throughput and the
//! worker-to-worker transfer bandwidth are reported.
//!
//! Two join strategies are compared:
//!
//! - **generic**: a lazy inner join declared on the dataset abstraction and
//!   shuffled by the cluster's task graph
//! - **explicit**: the cluster's peer-to-peer join primitive
//!
//! ## Quick Start
//!
//! ```bash
//! # Two in-process workers, 1M rows per partition, three runs
//! $ mergebench
//!
//! # Explicit strategy, markdown output
//! $ mergebench --backend explicit --markdown
//!
//! # Profile the final run
//! $ mergebench --runs 5 --profile merge-profile.json
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use mergebench::bench::{render, run_benchmark};
//! use mergebench::cluster::{LocalCluster, LocalClusterOptions};
//! use mergebench::{Result, RunConfig};
//!
//! fn main() -> Result<()> {
//!     let config = RunConfig {
//!         chunk_size: 10_000,
//!         ..Default::default()
//!     };
//!     let cluster = LocalCluster::start(config.local_cluster_options())?;
//!     let results = run_benchmark(&cluster, &config)?;
//!     print!("{}", render(&config, &results));
//!     Ok(())
//! }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod bench;
pub mod cluster;
pub mod config;
pub mod datagen;
pub mod error;
pub mod frame;
pub mod profile;
pub mod units;

pub use bench::{run_benchmark, BenchmarkResults, RunSample};
pub use cluster::{connect, Cluster, Dataset, LocalCluster, LocalClusterOptions};
pub use config::{Backend, BenchArgs, RunConfig};
pub use datagen::{generate, generate_chunk, PartitionSpec, Role};
pub use error::{ClusterError, ConfigError, MergeBenchError, Result};
