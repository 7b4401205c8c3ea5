//! Error types for mergebench
//!
//! Every failure in setup, data generation, or join execution propagates to
//! the binary's top level. Nothing in the benchmark core retries.

use thiserror::Error;

mod domain;

pub use domain::{ClusterError, ConfigError};

/// Result type alias for mergebench operations
pub type Result<T> = std::result::Result<T, MergeBenchError>;

/// Main error type for mergebench
#[derive(Error, Debug)]
pub enum MergeBenchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MergeBenchError {
    /// Create a configuration error for a single setting
    ///
    /// # Example
    /// ```ignore
    /// MergeBenchError::config("runs", "must be at least 1")
    /// // produces: "Configuration error: runs: must be at least 1"
    /// ```
    pub fn config(setting: &str, reason: impl Into<String>) -> Self {
        MergeBenchError::Config(ConfigError::invalid_setting(setting, reason))
    }

    /// Create a precondition error
    pub fn precondition(detail: impl Into<String>) -> Self {
        MergeBenchError::Precondition(detail.into())
    }

    /// Whether the error was raised before the cluster was contacted
    pub fn is_config(&self) -> bool {
        matches!(self, MergeBenchError::Config(_))
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            MergeBenchError::Config(_) => 2,
            _ => 1,
        }
    }
}
