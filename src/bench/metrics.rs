//! Metrics aggregator
//!
//! Turns the per-worker incoming transfer logs into per-pair bandwidth
//! quartiles and byte totals. Logs accumulate over every run, so the summary
//! covers the whole benchmark.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cluster::{Cluster, ClusterResult, TransferEvent, WorkerId, WorkerInfo};
use crate::error::Result;

/// Quantiles reported for each worker pair
pub const QUARTILES: [f64; 3] = [0.25, 0.5, 0.75];

/// Receiving and sending worker, by stable name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WorkerPair {
    pub receiver: String,
    pub sender: String,
}

impl WorkerPair {
    pub fn new(receiver: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
            sender: sender.into(),
        }
    }
}

impl fmt::Display for WorkerPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.receiver, self.sender)
    }
}

/// Transfer statistics keyed by worker pair, ordered by names
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferSummary {
    /// 25th, 50th and 75th percentile of bandwidth in bytes per second
    pub bandwidth: BTreeMap<WorkerPair, [f64; 3]>,
    /// Sum of bytes moved
    pub total_bytes: BTreeMap<WorkerPair, u64>,
}

impl TransferSummary {
    pub fn is_empty(&self) -> bool {
        self.bandwidth.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bandwidth.len()
    }
}

/// `q`-th quantile of `values` with linear interpolation between closest ranks
///
/// Returns `None` for an empty input.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * weight)
}

/// Summarize raw per-worker logs
///
/// Events smaller than `ignore_size` are dropped. Ids are resolved to names
/// through `workers`; an id the scheduler no longer knows keeps its id string.
/// A worker whose log could not be fetched contributes nothing.
pub fn summarize_transfers(
    logs: &BTreeMap<WorkerId, ClusterResult<Vec<TransferEvent>>>,
    workers: &BTreeMap<WorkerId, WorkerInfo>,
    ignore_size: u64,
) -> TransferSummary {
    let name_of = |id: &WorkerId| -> String {
        match workers.get(id) {
            Some(info) => info.name.clone(),
            None => {
                warn!(worker = %id, "Worker id unknown to scheduler, keeping id");
                id.to_string()
            }
        }
    };

    let mut grouped: BTreeMap<(WorkerId, WorkerId), (Vec<f64>, u64)> = BTreeMap::new();
    for (receiver, log) in logs {
        let events = match log {
            Ok(events) => events,
            Err(e) => {
                warn!(worker = %receiver, error = %e, "Transfer log unavailable, treating as empty");
                continue;
            }
        };
        for event in events.iter().filter(|e| e.total >= ignore_size) {
            let entry = grouped
                .entry((receiver.clone(), event.who.clone()))
                .or_default();
            entry.0.push(event.bandwidth);
            entry.1 += event.total;
        }
    }

    let mut by_name: BTreeMap<WorkerPair, (Vec<f64>, u64)> = BTreeMap::new();
    for ((receiver, sender), (bandwidths, total)) in grouped {
        let entry = by_name
            .entry(WorkerPair::new(name_of(&receiver), name_of(&sender)))
            .or_default();
        entry.0.extend(bandwidths);
        entry.1 += total;
    }

    let mut summary = TransferSummary::default();
    for (pair, (bandwidths, total)) in by_name {
        let quartiles = QUARTILES.map(|q| quantile(&bandwidths, q).unwrap_or(0.0));
        summary.bandwidth.insert(pair.clone(), quartiles);
        summary.total_bytes.insert(pair, total);
    }
    summary
}

/// Fetch every worker's transfer log and the scheduler's id-to-name map,
/// then summarize
pub fn aggregate<C: Cluster>(cluster: &C, ignore_size: u64) -> Result<TransferSummary> {
    let logs = cluster.run(|worker| worker.incoming_transfer_log())?;
    let workers = cluster.run_on_scheduler(|scheduler| scheduler.workers())?;
    let summary = summarize_transfers(&logs, &workers, ignore_size);
    debug!(pairs = summary.len(), ignore_size, "Aggregated transfer logs");
    Ok(summary)
}
