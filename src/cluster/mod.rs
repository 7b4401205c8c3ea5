//! Distributed execution contract
//!
//! The benchmark core only needs a small capability set from a cluster:
//! submit partitioned computations, persist and wait on them, run a closure on
//! every worker or on the scheduler, and capture a performance report. This
//! module defines that contract and ships one in-process implementation,
//! [`LocalCluster`].

pub mod address;
pub mod local;
pub mod node;

pub use address::ClusterAddress;
pub use local::{LocalCluster, LocalClusterOptions, LocalDataset};
pub use node::{TransferEvent, TransportConfig, WorkerId, WorkerInfo, WorkerStatus};

use crate::error::ClusterError;
use crate::frame::{Frame, Schema};
use crate::profile::ProfileCollector;
use std::collections::BTreeMap;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result type for cluster operations
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Computation producing one partition
pub type PartitionTask = Arc<dyn Fn() -> Frame + Send + Sync>;

/// Join flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinHow {
    #[default]
    Inner,
}

/// A lazily declared, partitioned dataset living on a cluster
pub trait Dataset: Clone + Send + Sync + Sized {
    /// Number of partitions
    fn npartitions(&self) -> usize;

    /// Submit the computation and return a handle to its (pending) result
    fn persist(&self) -> ClusterResult<Self>;

    /// Block until a persisted handle is fully materialized
    fn wait(&self) -> ClusterResult<()>;

    /// Total number of rows
    fn len(&self) -> ClusterResult<u64>;

    fn is_empty(&self) -> ClusterResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Column types, without computing anything
    fn dtypes(&self) -> &Schema;

    /// Re-partition by `column` and make it the index
    ///
    /// With explicit `divisions`, partition `i` holds values in
    /// `[divisions[i], divisions[i + 1])` (the last one inclusive).
    fn set_index(&self, column: &str, divisions: Option<Vec<i64>>) -> ClusterResult<Self>;

    /// Drop a column
    fn drop_column(&self, column: &str) -> ClusterResult<Self>;

    /// Equi-join with `other` on `on`
    fn merge(&self, other: &Self, on: &str, how: JoinHow) -> ClusterResult<Self>;
}

/// What a closure sent to [`Cluster::run`] can see of a worker
pub trait WorkerView {
    fn id(&self) -> &WorkerId;
    fn name(&self) -> &str;
    /// Every completed inbound transfer since the worker started
    fn incoming_transfer_log(&self) -> Vec<TransferEvent>;
    fn transport_config(&self) -> TransportConfig;
}

/// What a closure sent to [`Cluster::run_on_scheduler`] can see
pub trait SchedulerView {
    /// Current id to worker mapping
    fn workers(&self) -> BTreeMap<WorkerId, WorkerInfo>;
}

/// A connection to a running cluster
pub trait Cluster {
    type Dataset: Dataset;

    /// Transport protocol of the scheduler connection
    fn protocol(&self) -> &str;

    /// Number of live workers
    fn worker_count(&self) -> ClusterResult<usize>;

    /// Block until at least `n` workers are running
    fn wait_for_workers(&self, n: usize) -> ClusterResult<()>;

    /// Declare a dataset whose `i`-th partition is computed by `tasks[i]`
    fn from_tasks(&self, name: &str, meta: Schema, tasks: Vec<PartitionTask>) -> Self::Dataset;

    /// Peer-to-peer shuffle join that bypasses the task-graph shuffle
    fn explicit_join(
        &self,
        left: &Self::Dataset,
        right: &Self::Dataset,
        on: &str,
    ) -> ClusterResult<Self::Dataset>;

    /// Run `f` on every worker
    fn run<T, F>(&self, f: F) -> ClusterResult<BTreeMap<WorkerId, ClusterResult<T>>>
    where
        F: Fn(&dyn WorkerView) -> T;

    /// Run `f` on the scheduler
    fn run_on_scheduler<T, F>(&self, f: F) -> ClusterResult<T>
    where
        F: FnOnce(&dyn SchedulerView) -> T;

    /// Collector fed while a performance report is open
    fn profile_collector(&self) -> Arc<ProfileCollector>;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to the cluster at `address`
///
/// `inproc://` (or `inproc://<n>`) starts an in-process cluster. Network
/// protocols are probed for reachability, but a remote transport is not built
/// into this crate, so they fail with [`ClusterError::UnsupportedProtocol`].
pub fn connect(address: &str, options: LocalClusterOptions) -> ClusterResult<LocalCluster> {
    let addr: ClusterAddress = address.parse()?;
    match addr.protocol() {
        "inproc" => {
            let n_workers = if addr.location().is_empty() {
                options.n_workers
            } else {
                addr.location().parse::<usize>().map_err(|e| {
                    ClusterError::invalid_address(address, format!("worker count: {}", e))
                })?
            };
            info!(address = %addr, n_workers, "Connecting to in-process cluster");
            LocalCluster::start(LocalClusterOptions {
                n_workers,
                ..options
            })
        }
        "tcp" | "tls" | "ucx" => {
            let (host, port) = addr.host_port()?;
            let target = (host, port)
                .to_socket_addrs()
                .map_err(|e| ClusterError::unreachable(addr.to_string(), e.to_string()))?
                .next()
                .ok_or_else(|| ClusterError::unreachable(addr.to_string(), "no address resolved"))?;
            if let Err(e) = TcpStream::connect_timeout(&target, CONNECT_TIMEOUT) {
                warn!(address = %addr, error = %e, "Scheduler unreachable");
                return Err(ClusterError::unreachable(addr.to_string(), e.to_string()));
            }
            Err(ClusterError::unsupported_protocol(format!(
                "{} (scheduler reachable, but no remote transport is built in)",
                addr.protocol()
            )))
        }
        other => Err(ClusterError::unsupported_protocol(other)),
    }
}
