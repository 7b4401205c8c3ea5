//! Worker types for cluster membership
//!
//! Worker ids are issued per connection and must not be cached across
//! reconnects; worker names are stable and are what reports show.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection-scoped identifier of a worker
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a worker as seen by the scheduler
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum WorkerStatus {
    /// Registered but not yet accepting tasks
    #[default]
    Init,
    /// Accepting tasks
    Running,
    /// Shutting down
    Closing,
}

/// Scheduler-side record of a worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerInfo {
    /// Connection-scoped id
    pub id: WorkerId,

    /// Stable name
    pub name: String,

    /// Worker state
    pub status: WorkerStatus,
}

impl WorkerInfo {
    pub fn new(id: WorkerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: WorkerStatus::Init,
        }
    }

    /// Set the worker status
    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, WorkerStatus::Running)
    }
}

/// One completed inbound transfer, as logged by the receiving worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Sending worker
    pub who: WorkerId,
    /// Bytes moved
    pub total: u64,
    /// Transfer duration in seconds
    pub duration: f64,
    /// Bytes per second
    pub bandwidth: f64,
}

impl TransferEvent {
    pub fn new(who: WorkerId, total: u64, duration: f64) -> Self {
        let bandwidth = if duration > 0.0 {
            total as f64 / duration
        } else {
            0.0
        };
        Self {
            who,
            total,
            duration,
            bandwidth,
        }
    }
}

/// Transport capabilities a worker was configured with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub tcp: bool,
    pub infiniband: bool,
    pub nvlink: bool,
}
