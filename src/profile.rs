//! Scoped performance-report capture
//!
//! A [`PerformanceReport`] switches task recording on for the lifetime of the
//! guard and writes a JSON artifact when it is finished or dropped. Clusters
//! expose a shared [`ProfileCollector`] that their executors feed.

use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// One executed task, as seen by the profiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task key, e.g. `merge-3`
    pub key: String,
    /// Name of the worker that ran the task
    pub worker: String,
    /// Wall-clock duration of the task
    pub duration_seconds: f64,
    /// Rows produced by the task
    pub rows: usize,
}

/// Sink for task records, active only inside a report scope
#[derive(Debug, Default)]
pub struct ProfileCollector {
    active: AtomicBool,
    records: Mutex<Vec<TaskRecord>>,
}

impl ProfileCollector {
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Record a task if a report scope is open
    pub fn record(&self, record: TaskRecord) {
        if self.is_active() {
            self.records.lock().push(record);
        }
    }

    fn start(&self) {
        self.records.lock().clear();
        self.active.store(true, Ordering::Release);
    }

    fn stop(&self) -> Vec<TaskRecord> {
        self.active.store(false, Ordering::Release);
        std::mem::take(&mut *self.records.lock())
    }
}

/// Contents of a written performance report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub task_count: usize,
    pub tasks: Vec<TaskRecord>,
}

/// Guard that captures task records until finished or dropped
#[must_use = "the report is written when the guard is finished or dropped"]
pub struct PerformanceReport {
    path: PathBuf,
    collector: Arc<ProfileCollector>,
    started: Instant,
    finished: bool,
}

impl PerformanceReport {
    /// Open a capture scope that writes to `path` on exit
    pub fn enter(collector: Arc<ProfileCollector>, path: impl AsRef<Path>) -> Self {
        collector.start();
        Self {
            path: path.as_ref().to_path_buf(),
            collector,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the scope and write the artifact, reporting any I/O failure
    pub fn finish(mut self) -> Result<ReportArtifact> {
        self.finished = true;
        self.write()
    }

    fn write(&self) -> Result<ReportArtifact> {
        let tasks = self.collector.stop();
        let artifact = ReportArtifact {
            generated_at: Utc::now(),
            duration_seconds: self.started.elapsed().as_secs_f64(),
            task_count: tasks.len(),
            tasks,
        };
        let json = serde_json::to_string_pretty(&artifact)?;
        std::fs::write(&self.path, json)?;
        info!(
            path = %self.path.display(),
            tasks = artifact.task_count,
            "Wrote performance report"
        );
        Ok(artifact)
    }
}

impl Drop for PerformanceReport {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.write() {
            warn!(path = %self.path.display(), error = %e, "Failed to write performance report");
        }
    }
}
