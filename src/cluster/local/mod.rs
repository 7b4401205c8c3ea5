//! In-process cluster
//!
//! Workers are simulated inside one process. Submitted computations run on a
//! tokio blocking pool, so `persist` returns immediately and `wait` blocks,
//! the same way a remote scheduler behaves. Data movement between workers is
//! real serialization through a byte buffer, which gives the transfer logs
//! meaningful sizes and bandwidths.

mod engine;
mod exchange;

use self::engine::{Completion, Engine, Materialization, Node, Plan, WorkerState};
use super::{
    Cluster, ClusterResult, Dataset, JoinHow, PartitionTask, SchedulerView, TransportConfig,
    WorkerId, WorkerInfo, WorkerStatus, WorkerView,
};
use crate::error::ClusterError;
use crate::frame::Schema;
use crate::profile::ProfileCollector;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::info;

/// Default number of in-process workers
pub const DEFAULT_LOCAL_WORKERS: usize = 2;

/// Options for starting a [`LocalCluster`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClusterOptions {
    /// Number of workers
    pub n_workers: usize,
    /// Reuse a pooled transfer buffer per worker
    pub memory_pool: bool,
}

impl Default for LocalClusterOptions {
    fn default() -> Self {
        Self {
            n_workers: DEFAULT_LOCAL_WORKERS,
            memory_pool: true,
        }
    }
}

/// A cluster whose workers live in this process
pub struct LocalCluster {
    engine: Arc<Engine>,
    runtime: Runtime,
    session: String,
}

impl fmt::Debug for LocalCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCluster")
            .field("session", &self.session)
            .field("n_workers", &self.engine.n_workers())
            .field("memory_pool", &self.engine.memory_pool)
            .finish()
    }
}

impl LocalCluster {
    /// Start a cluster with `options.n_workers` running workers
    pub fn start(options: LocalClusterOptions) -> ClusterResult<Self> {
        if options.n_workers == 0 {
            return Err(ClusterError::NotEnoughWorkers {
                requested: 1,
                available: 0,
            });
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(options.n_workers)
            .thread_name("mergebench-local")
            .build()
            .map_err(|e| ClusterError::Runtime(e.to_string()))?;

        let session = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let workers = (0..options.n_workers)
            .map(|i| {
                let info = WorkerInfo::new(
                    WorkerId::new(format!("inproc://{}/{}", session, i)),
                    format!("local-{}", i),
                )
                .with_status(WorkerStatus::Running);
                WorkerState::new(info, TransportConfig::default())
            })
            .collect();

        info!(
            session = %session,
            n_workers = options.n_workers,
            memory_pool = options.memory_pool,
            "Started local cluster"
        );

        Ok(Self {
            engine: Arc::new(Engine {
                workers,
                memory_pool: options.memory_pool,
                profile: ProfileCollector::new_shared(),
            }),
            runtime,
            session,
        })
    }

    /// Identifier of this connection; worker ids embed it
    pub fn session(&self) -> &str {
        &self.session
    }

    fn dataset(&self, node: Node) -> LocalDataset {
        LocalDataset {
            engine: self.engine.clone(),
            handle: self.runtime.handle().clone(),
            node: Arc::new(node),
        }
    }
}

fn require_column(schema: &Schema, column: &str) -> ClusterResult<()> {
    if schema.contains(column) {
        Ok(())
    } else {
        Err(ClusterError::unknown_column(column))
    }
}

/// Handle to a dataset on a [`LocalCluster`]
#[derive(Clone)]
pub struct LocalDataset {
    engine: Arc<Engine>,
    handle: Handle,
    node: Arc<Node>,
}

impl fmt::Debug for LocalDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalDataset")
            .field("npartitions", &self.node.npartitions)
            .field("schema", &self.node.schema)
            .field("persisted", &self.is_persisted())
            .finish()
    }
}

impl LocalDataset {
    fn derive(&self, plan: Plan, schema: Schema, npartitions: usize) -> Self {
        Self {
            engine: self.engine.clone(),
            handle: self.handle.clone(),
            node: Arc::new(Node {
                plan,
                schema,
                npartitions,
            }),
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self.node.plan, Plan::Persisted(_))
    }

    fn same_cluster(&self, other: &LocalDataset) -> ClusterResult<()> {
        if Arc::ptr_eq(&self.engine, &other.engine) {
            Ok(())
        } else {
            Err(ClusterError::from("datasets belong to different clusters"))
        }
    }

    /// Computed partitions, with the worker holding each
    pub fn partitions(&self) -> ClusterResult<Vec<(usize, crate::frame::Frame)>> {
        let parts = match &self.node.plan {
            Plan::Persisted(slot) => slot.wait()?,
            _ => self.engine.execute(&self.node)?,
        };
        Ok(parts.iter().map(|p| (p.worker, p.frame.clone())).collect())
    }
}

impl Dataset for LocalDataset {
    fn npartitions(&self) -> usize {
        self.node.npartitions
    }

    fn persist(&self) -> ClusterResult<Self> {
        if self.is_persisted() {
            return Ok(self.clone());
        }
        let slot = Arc::new(Materialization::default());
        let completion = Completion::new(slot.clone());
        let engine = self.engine.clone();
        let node = self.node.clone();
        self.handle.spawn_blocking(move || {
            let result = engine.execute(&node);
            completion.finish(result);
        });
        Ok(self.derive(
            Plan::Persisted(slot),
            self.node.schema.clone(),
            self.node.npartitions,
        ))
    }

    fn wait(&self) -> ClusterResult<()> {
        // A lazy handle has nothing in flight
        match &self.node.plan {
            Plan::Persisted(slot) => slot.wait().map(|_| ()),
            _ => Ok(()),
        }
    }

    fn len(&self) -> ClusterResult<u64> {
        let parts = match &self.node.plan {
            Plan::Persisted(slot) => slot.wait()?,
            _ => self.engine.execute(&self.node)?,
        };
        Ok(parts.iter().map(|p| p.frame.num_rows() as u64).sum())
    }

    fn dtypes(&self) -> &Schema {
        &self.node.schema
    }

    fn set_index(&self, column: &str, divisions: Option<Vec<i64>>) -> ClusterResult<Self> {
        require_column(&self.node.schema, column)?;
        let npartitions = match &divisions {
            Some(d) => {
                if d.len() < 2 || d.windows(2).any(|w| w[0] > w[1]) {
                    return Err(ClusterError::materialization(
                        "set_index",
                        "divisions must be sorted and have at least two entries",
                    ));
                }
                d.len() - 1
            }
            None => self.node.npartitions,
        };
        Ok(self.derive(
            Plan::SetIndex {
                input: self.node.clone(),
                column: column.to_string(),
                divisions,
            },
            self.node.schema.without(column),
            npartitions,
        ))
    }

    fn drop_column(&self, column: &str) -> ClusterResult<Self> {
        require_column(&self.node.schema, column)?;
        Ok(self.derive(
            Plan::DropColumn {
                input: self.node.clone(),
                column: column.to_string(),
            },
            self.node.schema.without(column),
            self.node.npartitions,
        ))
    }

    fn merge(&self, other: &Self, on: &str, how: JoinHow) -> ClusterResult<Self> {
        match how {
            JoinHow::Inner => {}
        }
        self.same_cluster(other)?;
        require_column(&self.node.schema, on)?;
        require_column(&other.node.schema, on)?;
        Ok(self.derive(
            Plan::Merge {
                left: self.node.clone(),
                right: other.node.clone(),
                on: on.to_string(),
            },
            self.node.schema.joined(&other.node.schema, on),
            self.node.npartitions.max(other.node.npartitions),
        ))
    }
}

struct LocalScheduler<'a> {
    engine: &'a Engine,
}

impl SchedulerView for LocalScheduler<'_> {
    fn workers(&self) -> BTreeMap<WorkerId, WorkerInfo> {
        self.engine
            .workers
            .iter()
            .map(|w| (w.info.id.clone(), w.info.clone()))
            .collect()
    }
}

impl Cluster for LocalCluster {
    type Dataset = LocalDataset;

    fn protocol(&self) -> &str {
        "inproc"
    }

    fn worker_count(&self) -> ClusterResult<usize> {
        Ok(self.engine.n_workers())
    }

    fn wait_for_workers(&self, n: usize) -> ClusterResult<()> {
        let available = self
            .engine
            .workers
            .iter()
            .filter(|w| w.info.is_running())
            .count();
        if n <= available {
            Ok(())
        } else {
            Err(ClusterError::NotEnoughWorkers {
                requested: n,
                available,
            })
        }
    }

    fn from_tasks(&self, name: &str, meta: Schema, tasks: Vec<PartitionTask>) -> LocalDataset {
        let npartitions = tasks.len();
        self.dataset(Node {
            plan: Plan::Source {
                name: name.to_string(),
                tasks,
            },
            schema: meta,
            npartitions,
        })
    }

    fn explicit_join(
        &self,
        left: &LocalDataset,
        right: &LocalDataset,
        on: &str,
    ) -> ClusterResult<LocalDataset> {
        left.same_cluster(right)?;
        if !Arc::ptr_eq(&self.engine, &left.engine) {
            return Err(ClusterError::from("dataset belongs to a different cluster"));
        }
        require_column(&left.node.schema, on)?;
        require_column(&right.node.schema, on)?;
        Ok(left.derive(
            Plan::ExplicitJoin {
                left: left.node.clone(),
                right: right.node.clone(),
                on: on.to_string(),
            },
            left.node.schema.joined(&right.node.schema, on),
            self.engine.n_workers(),
        ))
    }

    fn run<T, F>(&self, f: F) -> ClusterResult<BTreeMap<WorkerId, ClusterResult<T>>>
    where
        F: Fn(&dyn WorkerView) -> T,
    {
        Ok(self
            .engine
            .workers
            .iter()
            .map(|w| (w.info.id.clone(), Ok(f(w as &dyn WorkerView))))
            .collect())
    }

    fn run_on_scheduler<T, F>(&self, f: F) -> ClusterResult<T>
    where
        F: FnOnce(&dyn SchedulerView) -> T,
    {
        Ok(f(&LocalScheduler {
            engine: &self.engine,
        }))
    }

    fn profile_collector(&self) -> Arc<ProfileCollector> {
        self.engine.profile.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, Field, Frame};

    fn cluster(n: usize) -> LocalCluster {
        LocalCluster::start(LocalClusterOptions {
            n_workers: n,
            memory_pool: true,
        })
        .unwrap()
    }

    fn source(cluster: &LocalCluster, parts: Vec<Vec<i64>>) -> LocalDataset {
        let tasks: Vec<PartitionTask> = parts
            .into_iter()
            .map(|keys| {
                let task: PartitionTask = Arc::new(move || {
                    let payload = keys.iter().map(|k| k * 10).collect();
                    Frame::new(vec![
                        Column::new("key", keys.clone()),
                        Column::new("payload", payload),
                    ])
                    .unwrap()
                });
                task
            })
            .collect();
        let meta = Schema::new(vec![Field::int64("key"), Field::int64("payload")]);
        cluster.from_tasks("test-data", meta, tasks)
    }

    fn total_transfers(cluster: &LocalCluster) -> usize {
        cluster
            .run(|w| w.incoming_transfer_log().len())
            .unwrap()
            .into_values()
            .map(|r| r.unwrap())
            .sum()
    }

    #[test]
    fn test_persist_wait_len() {
        let cluster = cluster(2);
        let ds = source(&cluster, vec![vec![1, 2, 3], vec![4, 5]]).persist().unwrap();
        ds.wait().unwrap();
        assert!(ds.is_persisted());
        assert_eq!(ds.len().unwrap(), 5);
        assert_eq!(ds.npartitions(), 2);
        let workers: Vec<usize> = ds.partitions().unwrap().iter().map(|(w, _)| *w).collect();
        assert_eq!(workers, vec![0, 1]);
    }

    #[test]
    fn test_set_index_with_divisions_moves_rows() {
        let cluster = cluster(2);
        // Worker 0 holds keys that belong to partition 1 and vice versa
        let ds = source(&cluster, vec![vec![10, 11], vec![0, 1]]);
        let indexed = ds.set_index("key", Some(vec![0, 10, 20])).unwrap();
        assert_eq!(indexed.dtypes().len(), 1);

        let parts = indexed.partitions().unwrap();
        assert_eq!(parts[0].1.index().unwrap().values, vec![0, 1]);
        assert_eq!(parts[1].1.index().unwrap().values, vec![10, 11]);
        assert_eq!(total_transfers(&cluster), 2);
    }

    #[test]
    fn test_set_index_rejects_bad_divisions() {
        let cluster = cluster(1);
        let ds = source(&cluster, vec![vec![1]]);
        assert!(ds.set_index("key", Some(vec![5, 1])).is_err());
        assert!(ds.set_index("key", Some(vec![5])).is_err());
        assert!(ds.set_index("missing", None).is_err());
    }

    #[test]
    fn test_merge_and_explicit_join_agree() {
        let cluster = cluster(2);
        let left = source(&cluster, vec![(0..50).collect(), (50..100).collect()]);
        let right = source(&cluster, vec![(25..75).collect(), (200..250).collect()]);

        let generic = left.merge(&right, "key", JoinHow::Inner).unwrap();
        assert_eq!(generic.len().unwrap(), 50);
        let logged = total_transfers(&cluster);
        assert!(logged > 0);

        let explicit = cluster.explicit_join(&left, &right, "key").unwrap();
        assert_eq!(explicit.npartitions(), 2);
        assert_eq!(explicit.len().unwrap(), 50);
        // Peer-to-peer exchange bypasses the transfer log
        assert_eq!(total_transfers(&cluster), logged);

        let names: Vec<String> = explicit
            .dtypes()
            .fields()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, vec!["key", "payload_x", "payload_y"]);
    }

    #[test]
    fn test_drop_column() {
        let cluster = cluster(1);
        let ds = source(&cluster, vec![vec![1, 2]]);
        let dropped = ds.drop_column("payload").unwrap();
        assert_eq!(dropped.dtypes().len(), 1);
        let parts = dropped.partitions().unwrap();
        assert!(parts[0].1.column("payload").is_none());
        assert!(ds.drop_column("nope").is_err());
    }

    #[test]
    fn test_scheduler_view_and_wait_for_workers() {
        let cluster = cluster(3);
        let workers = cluster.run_on_scheduler(|s| s.workers()).unwrap();
        assert_eq!(workers.len(), 3);
        assert!(workers
            .keys()
            .all(|id| id.as_str().contains(cluster.session())));
        let mut names: Vec<_> = workers.values().map(|w| w.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["local-0", "local-1", "local-2"]);

        assert!(cluster.wait_for_workers(3).is_ok());
        assert!(matches!(
            cluster.wait_for_workers(4),
            Err(ClusterError::NotEnoughWorkers { requested: 4, available: 3 })
        ));
    }

    #[test]
    fn test_sessions_issue_fresh_ids() {
        let a = cluster(1);
        let b = cluster(1);
        let ids_a = a.run(|w| w.id().clone()).unwrap();
        let ids_b = b.run(|w| w.id().clone()).unwrap();
        assert_ne!(ids_a.keys().next(), ids_b.keys().next());
    }

    #[test]
    fn test_without_memory_pool() {
        let cluster = LocalCluster::start(LocalClusterOptions {
            n_workers: 2,
            memory_pool: false,
        })
        .unwrap();
        let left = source(&cluster, vec![vec![1, 2, 3], vec![4, 5, 6]]);
        let joined = left.merge(&left, "key", JoinHow::Inner).unwrap();
        assert_eq!(joined.len().unwrap(), 6);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = LocalCluster::start(LocalClusterOptions {
            n_workers: 0,
            memory_pool: true,
        })
        .unwrap_err();
        assert!(matches!(err, ClusterError::NotEnoughWorkers { .. }));
    }
}
