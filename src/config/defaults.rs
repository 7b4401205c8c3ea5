//! Default constants for mergebench configuration
//!
//! These constants define the values used when neither a flag nor a
//! `MERGEBENCH_*` environment variable is given.

/// Default rows per generated partition
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Default minimum transfer size kept in the bandwidth table
pub const DEFAULT_IGNORE_SIZE: &str = "1 MiB";

/// Default fraction of probe keys that find a match in the build side
pub const DEFAULT_FRAC_MATCH: f64 = 0.3;

/// Default number of timed repetitions
pub const DEFAULT_RUNS: usize = 3;

/// Default worker count for the in-process cluster
pub const DEFAULT_N_WORKERS: usize = 2;

/// Default log level (stderr)
pub const DEFAULT_LOG_LEVEL: &str = "warn";

