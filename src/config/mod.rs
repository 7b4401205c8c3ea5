//! Configuration module for mergebench
//!
//! - `defaults` - Default constants and values
//! - `args` - CLI argument definitions
//!
//! [`RunConfig`] is the validated, immutable form of [`BenchArgs`]. It is
//! built once, before any cluster is contacted, and then only read.

mod args;
mod defaults;

pub use args::BenchArgs;
pub use defaults::*;

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::cluster::LocalClusterOptions;
use crate::datagen::DEFAULT_SEED;
use crate::error::ConfigError;

/// Join strategy under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Task-graph merge expressed on the dataset abstraction
    #[default]
    #[value(alias = "dask")]
    Generic,
    /// Direct worker-to-worker shuffle and local join
    #[value(alias = "explicit-comms")]
    Explicit,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Generic => "generic",
            Backend::Explicit => "explicit",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub backend: Backend,
    pub chunk_size: usize,
    pub ignore_size: u64,
    pub frac_match: f64,
    pub memory_pool: bool,
    pub profile: Option<PathBuf>,
    pub shuffle: bool,
    pub markdown: bool,
    pub set_index: bool,
    pub scheduler_addr: Option<String>,
    pub runs: usize,
    pub n_workers: usize,
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Generic,
            chunk_size: DEFAULT_CHUNK_SIZE,
            ignore_size: 1 << 20,
            frac_match: DEFAULT_FRAC_MATCH,
            memory_pool: true,
            profile: None,
            shuffle: true,
            markdown: false,
            set_index: false,
            scheduler_addr: None,
            runs: DEFAULT_RUNS,
            n_workers: DEFAULT_N_WORKERS,
            seed: DEFAULT_SEED,
        }
    }
}

impl RunConfig {
    /// Build and validate a configuration from parsed arguments
    pub fn from_args(args: &BenchArgs) -> Result<Self, ConfigError> {
        let config = Self {
            backend: args.backend,
            chunk_size: args.chunk_size,
            ignore_size: args.ignore_size,
            frac_match: args.frac_match,
            memory_pool: !args.no_memory_pool,
            profile: args.profile.clone(),
            shuffle: !args.no_shuffle,
            markdown: args.markdown,
            set_index: args.set_index,
            scheduler_addr: args
                .scheduler_addr
                .as_ref()
                .map(|addr| addr.trim().to_string())
                .filter(|addr| !addr.is_empty()),
            runs: args.runs,
            n_workers: args.n_workers,
            seed: args.seed,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every setting that would otherwise fail after connecting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid_setting(
                "chunk-size",
                "must be a positive number of rows",
            ));
        }
        if self.runs == 0 {
            return Err(ConfigError::invalid_setting("runs", "must be at least 1"));
        }
        if !(self.frac_match > 0.0 && self.frac_match <= 1.0) {
            return Err(ConfigError::invalid_setting(
                "frac-match",
                format!("{} is outside (0, 1]", self.frac_match),
            ));
        }
        if self.n_workers == 0 {
            return Err(ConfigError::invalid_setting(
                "n-workers",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Options for an in-process cluster matching this configuration
    pub fn local_cluster_options(&self) -> LocalClusterOptions {
        LocalClusterOptions {
            n_workers: self.n_workers,
            memory_pool: self.memory_pool,
        }
    }

    /// Whether the final run is captured into a performance report
    pub fn profiling(&self) -> bool {
        self.profile.is_some()
    }
}
