//! Report renderer
//!
//! Plain text, optionally fenced for markdown. The transfer table is only
//! shown for the generic backend since the explicit join does not go through
//! the transfer logs.

use super::metrics::TransferSummary;
use super::BenchmarkResults;
use crate::config::{Backend, RunConfig};
use crate::units::{format_bandwidth, format_bytes, format_time};

const RULE: &str = "-------------------------------";
const DOUBLE_RULE: &str = "===============================";
const LABEL_WIDTH: usize = 15;

/// Render the full report, ending with a newline
pub fn render(config: &RunConfig, results: &BenchmarkResults) -> String {
    let mut lines: Vec<String> = Vec::new();

    if config.markdown {
        lines.push("```".to_string());
    }
    lines.push("Merge benchmark".to_string());
    lines.push(RULE.to_string());
    let data_processed = results
        .samples
        .first()
        .map(|s| s.bytes_processed)
        .unwrap_or_default();
    let header = [
        ("backend", config.backend.to_string()),
        ("rows-per-chunk", config.chunk_size.to_string()),
        ("protocol", results.protocol.clone()),
        ("n_workers", results.n_workers.to_string()),
        ("memory-pool", config.memory_pool.to_string()),
        ("frac-match", config.frac_match.to_string()),
        ("shuffle", config.shuffle.to_string()),
        ("set-index", config.set_index.to_string()),
        ("tcp", results.transport.tcp.to_string()),
        ("ib", results.transport.infiniband.to_string()),
        ("nvlink", results.transport.nvlink.to_string()),
        ("data-processed", format_bytes(data_processed)),
    ];
    for (label, value) in header {
        lines.push(format!("{:<width$}| {}", label, value, width = LABEL_WIDTH));
    }

    lines.push(DOUBLE_RULE.to_string());
    lines.push(format!("{:<width$}| Throughput", "Wall-clock", width = LABEL_WIDTH));
    lines.push(RULE.to_string());
    let runs = results.samples.len().max(1) as f64;
    let mut avg_time = 0.0;
    let mut avg_bw = 0.0;
    for sample in &results.samples {
        let throughput = sample.throughput();
        avg_time += sample.elapsed_seconds / runs;
        avg_bw += throughput as f64 / runs;
        lines.push(timing_line(sample.elapsed_seconds, throughput as f64));
    }
    lines.push(DOUBLE_RULE.to_string());
    lines.push("Averages".to_string());
    lines.push(timing_line(avg_time, avg_bw));
    lines.push(DOUBLE_RULE.to_string());
    if config.markdown {
        lines.push("\n```".to_string());
    }

    if config.backend == Backend::Generic {
        render_transfers(&mut lines, &results.transfers, config.markdown);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn timing_line(seconds: f64, bytes_per_sec: f64) -> String {
    format!(
        "{:<width$}| {}",
        format_time(seconds),
        format_bandwidth(bytes_per_sec),
        width = LABEL_WIDTH
    )
}

fn render_transfers(lines: &mut Vec<String>, transfers: &TransferSummary, markdown: bool) {
    if markdown {
        lines.push("<details>\n<summary>Worker-Worker Transfer Rates</summary>\n\n```".to_string());
    }
    lines.push("(w1,w2)     | 25% 50% 75% (total nbytes)".to_string());
    lines.push(RULE.to_string());
    for (pair, [p25, p50, p75]) in &transfers.bandwidth {
        let total = transfers.total_bytes.get(pair).copied().unwrap_or_default();
        lines.push(format!(
            "({},{})     | {} {} {} ({})",
            short_label(&pair.receiver),
            short_label(&pair.sender),
            format_bandwidth(*p25),
            format_bandwidth(*p50),
            format_bandwidth(*p75),
            format_bytes(total)
        ));
    }
    if markdown {
        lines.push("```\n</details>\n".to_string());
    }
}

/// The part of a worker name after its last `:`, or the whole name
pub fn short_label(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}
