//! Domain-specific error types for mergebench

use thiserror::Error;

/// Structured configuration error domain
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{setting}: {reason}")]
    InvalidSetting { setting: String, reason: String },
    #[error("missing {0}")]
    Missing(String),
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    pub fn invalid_setting(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            setting: setting.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(setting: impl Into<String>) -> Self {
        Self::Missing(setting.into())
    }
}

impl From<String> for ConfigError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<&str> for ConfigError {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}

/// Structured cluster error domain
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusterError {
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("scheduler unreachable at {address}: {reason}")]
    Unreachable { address: String, reason: String },
    #[error("requested {requested} workers, only {available} available")]
    NotEnoughWorkers { requested: usize, available: usize },
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("{operation}: {detail}")]
    Materialization { operation: String, detail: String },
    #[error("worker {worker}: {detail}")]
    WorkerFailed { worker: String, detail: String },
    #[error("runtime: {0}")]
    Runtime(String),
    #[error("{0}")]
    Message(String),
}

impl ClusterError {
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported_protocol(protocol: impl Into<String>) -> Self {
        Self::UnsupportedProtocol(protocol.into())
    }

    pub fn unreachable(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_column(column: impl Into<String>) -> Self {
        Self::UnknownColumn(column.into())
    }

    pub fn materialization(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Materialization {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn worker_failed(worker: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::WorkerFailed {
            worker: worker.into(),
            detail: detail.into(),
        }
    }
}

impl From<String> for ClusterError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<&str> for ClusterError {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}
