//! Plan execution for the in-process cluster
//!
//! Partitions are placed on worker `i mod n_workers`. Pieces that change
//! worker during a shuffle are encoded into a byte buffer and decoded on the
//! receiving side; the generic shuffle path logs each such move in the
//! receiver's incoming transfer log.

use super::exchange::{
    decode, encode_into, encoded_len, hash_join, split_by_divisions, split_by_hash,
    uniform_divisions,
};
use crate::cluster::{
    ClusterResult, PartitionTask, TransferEvent, TransportConfig, WorkerId, WorkerInfo,
    WorkerView,
};
use crate::error::ClusterError;
use crate::frame::{Frame, Schema};
use crate::profile::{ProfileCollector, TaskRecord};
use bytes::BytesMut;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Floor for measured transfer durations, so in-memory copies of tiny
/// pieces do not report infinite bandwidth
const MIN_TRANSFER_SECONDS: f64 = 1e-9;

/// A partition and the worker holding it
#[derive(Debug, Clone)]
pub(crate) struct Placed {
    pub worker: usize,
    pub frame: Frame,
}

pub(crate) type Partitions = Arc<Vec<Placed>>;

/// Per-worker state
pub(crate) struct WorkerState {
    pub info: WorkerInfo,
    pub transport: TransportConfig,
    incoming: Mutex<Vec<TransferEvent>>,
    pool: Mutex<BytesMut>,
}

impl WorkerState {
    pub fn new(info: WorkerInfo, transport: TransportConfig) -> Self {
        Self {
            info,
            transport,
            incoming: Mutex::new(Vec::new()),
            pool: Mutex::new(BytesMut::new()),
        }
    }
}

impl WorkerView for WorkerState {
    fn id(&self) -> &WorkerId {
        &self.info.id
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn incoming_transfer_log(&self) -> Vec<TransferEvent> {
        self.incoming.lock().clone()
    }

    fn transport_config(&self) -> TransportConfig {
        self.transport
    }
}

/// Result slot of a submitted computation
#[derive(Default)]
pub(crate) struct Materialization {
    state: Mutex<Option<ClusterResult<Partitions>>>,
    ready: Condvar,
}

impl Materialization {
    pub fn complete(&self, result: ClusterResult<Partitions>) {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(result);
        }
        self.ready.notify_all();
    }

    pub fn wait(&self) -> ClusterResult<Partitions> {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut state);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().is_some()
    }
}

/// Fails the materialization if the submitted task is dropped without
/// running, e.g. when the runtime shuts down first
pub(crate) struct Completion(Arc<Materialization>);

impl Completion {
    pub fn new(slot: Arc<Materialization>) -> Self {
        Self(slot)
    }

    pub fn finish(self, result: ClusterResult<Partitions>) {
        self.0.complete(result);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.0.is_complete() {
            self.0
                .complete(Err(ClusterError::Runtime("task cancelled".to_string())));
        }
    }
}

/// Lazy computation
pub(crate) enum Plan {
    Source {
        name: String,
        tasks: Vec<PartitionTask>,
    },
    Persisted(Arc<Materialization>),
    DropColumn {
        input: Arc<Node>,
        column: String,
    },
    SetIndex {
        input: Arc<Node>,
        column: String,
        divisions: Option<Vec<i64>>,
    },
    Merge {
        left: Arc<Node>,
        right: Arc<Node>,
        on: String,
    },
    ExplicitJoin {
        left: Arc<Node>,
        right: Arc<Node>,
        on: String,
    },
}

/// A plan with its output schema and partition count
pub(crate) struct Node {
    pub plan: Plan,
    pub schema: Schema,
    pub npartitions: usize,
}

/// Whether a move between workers is logged as a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    /// Task-graph data movement, visible in transfer logs
    Scheduler,
    /// Direct worker-to-worker exchange
    Peer,
}

pub(crate) struct Engine {
    pub workers: Vec<WorkerState>,
    pub memory_pool: bool,
    pub profile: Arc<ProfileCollector>,
}

impl Engine {
    pub fn n_workers(&self) -> usize {
        self.workers.len()
    }

    fn worker_for(&self, partition: usize) -> usize {
        partition % self.n_workers()
    }

    fn record(&self, key: String, worker: usize, started: Instant, rows: usize) {
        self.profile.record(TaskRecord {
            key,
            worker: self.workers[worker].info.name.clone(),
            duration_seconds: started.elapsed().as_secs_f64(),
            rows,
        });
    }

    /// Compute every partition of `node`
    pub fn execute(&self, node: &Node) -> ClusterResult<Partitions> {
        match &node.plan {
            Plan::Source { name, tasks } => self.execute_source(name, tasks),
            Plan::Persisted(slot) => slot.wait(),
            Plan::DropColumn { input, column } => {
                let input = self.execute(input)?;
                let out = input
                    .iter()
                    .map(|placed| {
                        let mut frame = placed.frame.clone();
                        frame.drop_column(column);
                        Placed {
                            worker: placed.worker,
                            frame,
                        }
                    })
                    .collect();
                Ok(Arc::new(out))
            }
            Plan::SetIndex {
                input,
                column,
                divisions,
            } => self.execute_set_index(input, column, divisions.as_deref()),
            Plan::Merge { left, right, on } => self.execute_merge(left, right, on, &node.schema),
            Plan::ExplicitJoin { left, right, on } => {
                self.execute_explicit_join(left, right, on, &node.schema)
            }
        }
    }

    fn execute_source(&self, name: &str, tasks: &[PartitionTask]) -> ClusterResult<Partitions> {
        let mut out = Vec::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            let worker = self.worker_for(i);
            let started = Instant::now();
            let frame = task();
            trace!(task = %name, partition = i, worker, rows = frame.num_rows(), "Computed partition");
            self.record(format!("{}-{}", name, i), worker, started, frame.num_rows());
            out.push(Placed { worker, frame });
        }
        Ok(Arc::new(out))
    }

    /// Move a piece to another worker
    fn transfer(
        &self,
        from: usize,
        to: usize,
        frame: Frame,
        channel: Channel,
    ) -> ClusterResult<Frame> {
        if from == to {
            return Ok(frame);
        }
        let total = encoded_len(&frame) as u64;
        let started = Instant::now();
        let received = if self.memory_pool {
            let mut buf = self.workers[to].pool.lock();
            buf.clear();
            encode_into(&frame, &mut buf);
            decode(&buf)?
        } else {
            let mut buf = BytesMut::with_capacity(total as usize);
            encode_into(&frame, &mut buf);
            decode(&buf.freeze())?
        };
        let duration = started.elapsed().as_secs_f64().max(MIN_TRANSFER_SECONDS);

        if channel == Channel::Scheduler {
            let event = TransferEvent::new(self.workers[from].info.id.clone(), total, duration);
            self.workers[to].incoming.lock().push(event);
        }
        Ok(received)
    }

    /// Route every piece of every input partition to its output partition
    fn shuffle<F>(
        &self,
        input: &[Placed],
        nout: usize,
        channel: Channel,
        mut split: F,
    ) -> ClusterResult<Vec<Vec<Frame>>>
    where
        F: FnMut(&Frame) -> ClusterResult<Vec<Frame>>,
    {
        let mut buckets: Vec<Vec<Frame>> = (0..nout).map(|_| Vec::new()).collect();
        for placed in input {
            for (j, piece) in split(&placed.frame)?.into_iter().enumerate() {
                if piece.num_rows() == 0 {
                    continue;
                }
                let dest = self.worker_for(j);
                buckets[j].push(self.transfer(placed.worker, dest, piece, channel)?);
            }
        }
        Ok(buckets)
    }

    fn concat(schema: &Schema, pieces: &[Frame]) -> ClusterResult<Frame> {
        let pieces: Vec<Frame> = pieces.iter().filter(|f| f.num_rows() > 0).cloned().collect();
        Frame::concat(schema, &pieces)
            .ok_or_else(|| ClusterError::materialization("concat", "mismatched partition columns"))
    }

    fn execute_set_index(
        &self,
        input: &Node,
        column: &str,
        divisions: Option<&[i64]>,
    ) -> ClusterResult<Partitions> {
        let parts = self.execute(input)?;
        let divisions = match divisions {
            Some(d) => d.to_vec(),
            None => {
                let values = parts
                    .iter()
                    .filter_map(|p| p.frame.column(column))
                    .flat_map(|c| c.iter().copied());
                let (lo, hi) = values.fold((i64::MAX, i64::MIN), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
                if lo > hi {
                    vec![0, 0]
                } else {
                    uniform_divisions(lo, hi, input.npartitions.max(1))
                }
            }
        };
        let nout = divisions.len().saturating_sub(1).max(1);
        debug!(column, nout, "Shuffling for set_index");

        let buckets = self.shuffle(&parts, nout, Channel::Scheduler, |frame| {
            split_by_divisions(frame, column, &divisions)
        })?;

        let mut out = Vec::with_capacity(nout);
        for (j, pieces) in buckets.iter().enumerate() {
            let worker = self.worker_for(j);
            let started = Instant::now();
            let mut frame = Self::concat(&input.schema, pieces)?;
            if !frame.set_index(column) {
                return Err(ClusterError::unknown_column(column));
            }
            self.record(format!("set-index-{}", j), worker, started, frame.num_rows());
            out.push(Placed { worker, frame });
        }
        Ok(Arc::new(out))
    }

    fn execute_merge(
        &self,
        left: &Node,
        right: &Node,
        on: &str,
        out_schema: &Schema,
    ) -> ClusterResult<Partitions> {
        let left_parts = self.execute(left)?;
        let right_parts = self.execute(right)?;
        let nout = left.npartitions.max(right.npartitions).max(1);
        debug!(on, nout, "Hash shuffle for merge");

        let split = |frame: &Frame| split_by_hash(frame, on, nout);
        let left_buckets = self.shuffle(&left_parts, nout, Channel::Scheduler, split)?;
        let right_buckets = self.shuffle(&right_parts, nout, Channel::Scheduler, split)?;

        let mut out = Vec::with_capacity(nout);
        for (j, (l, r)) in left_buckets.iter().zip(&right_buckets).enumerate() {
            let worker = self.worker_for(j);
            let started = Instant::now();
            let l = Self::concat(&left.schema, l)?;
            let r = Self::concat(&right.schema, r)?;
            let frame = hash_join(&l, &r, on, out_schema)?;
            self.record(format!("merge-{}", j), worker, started, frame.num_rows());
            out.push(Placed { worker, frame });
        }
        Ok(Arc::new(out))
    }

    /// Concatenate the partitions each worker already holds
    fn gather_local(&self, schema: &Schema, parts: &[Placed]) -> ClusterResult<Vec<Placed>> {
        (0..self.n_workers())
            .map(|worker| {
                let local: Vec<Frame> = parts
                    .iter()
                    .filter(|p| p.worker == worker)
                    .map(|p| p.frame.clone())
                    .collect();
                Ok(Placed {
                    worker,
                    frame: Self::concat(schema, &local)?,
                })
            })
            .collect()
    }

    fn execute_explicit_join(
        &self,
        left: &Node,
        right: &Node,
        on: &str,
        out_schema: &Schema,
    ) -> ClusterResult<Partitions> {
        let left_parts = self.execute(left)?;
        let right_parts = self.execute(right)?;
        let nw = self.n_workers();
        debug!(on, workers = nw, "Peer-to-peer exchange for explicit join");

        let left_local = self.gather_local(&left.schema, &left_parts)?;
        let right_local = self.gather_local(&right.schema, &right_parts)?;

        let split = |frame: &Frame| split_by_hash(frame, on, nw);
        let left_buckets = self.shuffle(&left_local, nw, Channel::Peer, split)?;
        let right_buckets = self.shuffle(&right_local, nw, Channel::Peer, split)?;

        let mut out = Vec::with_capacity(nw);
        for (worker, (l, r)) in left_buckets.iter().zip(&right_buckets).enumerate() {
            let started = Instant::now();
            let l = Self::concat(&left.schema, l)?;
            let r = Self::concat(&right.schema, r)?;
            let frame = hash_join(&l, &r, on, out_schema)?;
            self.record(format!("explicit-merge-{}", worker), worker, started, frame.num_rows());
            out.push(Placed { worker, frame });
        }
        Ok(Arc::new(out))
    }
}
