//! Command-line arguments for the merge benchmark
//!
//! This module defines the CLI arguments structure using clap.

use clap::Parser;
use std::path::PathBuf;

use super::defaults::*;
use super::Backend;
use crate::datagen::DEFAULT_SEED;
use crate::units::parse_bytes;

/// Command-line arguments for mergebench
#[derive(Parser, Debug, Clone)]
#[command(name = "mergebench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Distributed equal-join benchmark: generic task-graph merge vs explicit peer-to-peer merge"
)]
pub struct BenchArgs {
    /// Join strategy to benchmark
    #[arg(
        short,
        long,
        value_enum,
        env = "MERGEBENCH_BACKEND",
        default_value_t = Backend::Generic
    )]
    pub backend: Backend,

    /// Rows per generated partition
    #[arg(short, long, env = "MERGEBENCH_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Ignore transfers smaller than this in the bandwidth table ("1 MiB", "4kB", "512")
    #[arg(
        long,
        env = "MERGEBENCH_IGNORE_SIZE",
        default_value = DEFAULT_IGNORE_SIZE,
        value_parser = parse_byte_size,
        value_name = "NBYTES"
    )]
    pub ignore_size: u64,

    /// Fraction of probe keys that match a build key, in (0, 1]
    #[arg(long, env = "MERGEBENCH_FRAC_MATCH", default_value_t = DEFAULT_FRAC_MATCH)]
    pub frac_match: f64,

    /// Allocate a fresh transfer buffer per move instead of pooling
    #[arg(long, alias = "no-rmm-pool", env = "MERGEBENCH_NO_MEMORY_POOL")]
    pub no_memory_pool: bool,

    /// Write a performance report of the final run to this path
    #[arg(long, env = "MERGEBENCH_PROFILE", value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Keep build rows where they were generated (no re-index on the shuffle label)
    #[arg(long, env = "MERGEBENCH_NO_SHUFFLE")]
    pub no_shuffle: bool,

    /// Wrap the report in markdown fences
    #[arg(long, env = "MERGEBENCH_MARKDOWN")]
    pub markdown: bool,

    /// Re-index the join output on the key (generic backend only)
    #[arg(short = 's', long, env = "MERGEBENCH_SET_INDEX")]
    pub set_index: bool,

    /// Scheduler address (protocol://location). An in-process cluster is started when absent
    #[arg(long, env = "MERGEBENCH_SCHEDULER_ADDR", value_name = "ADDR")]
    pub scheduler_addr: Option<String>,

    /// Number of timed repetitions
    #[arg(long, env = "MERGEBENCH_RUNS", default_value_t = DEFAULT_RUNS)]
    pub runs: usize,

    /// Worker count of the in-process cluster
    #[arg(long, env = "MERGEBENCH_N_WORKERS", default_value_t = DEFAULT_N_WORKERS)]
    pub n_workers: usize,

    /// Seed for the data generator
    #[arg(long, env = "MERGEBENCH_SEED", default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "MERGEBENCH_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

fn parse_byte_size(value: &str) -> Result<u64, String> {
    parse_bytes(value).map_err(|e| e.to_string())
}
