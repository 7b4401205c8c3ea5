//! End-to-end benchmark tests against the in-process cluster

#[path = "common/mod.rs"]
mod common;

use clap::Parser;
use common::{local_cluster, small_config};
use mergebench::bench::{render, run_all, run_benchmark, run_once};
use mergebench::profile::ReportArtifact;
use mergebench::{connect, Backend, BenchArgs, ClusterError, LocalClusterOptions, RunConfig};
use tempfile::tempdir;

#[test]
fn generic_and_explicit_process_the_same_bytes() {
    let cluster = local_cluster(2);
    let generic = run_once(&cluster, &small_config(), false).unwrap();
    let explicit = run_once(
        &cluster,
        &RunConfig {
            backend: Backend::Explicit,
            ..small_config()
        },
        false,
    )
    .unwrap();
    // 2 sides x 2 workers x 1000 rows x 16 bytes
    assert_eq!(generic.bytes_processed, 64_000);
    assert_eq!(explicit.bytes_processed, generic.bytes_processed);
}

#[test]
fn worker_count_drives_dataset_size() {
    let cluster = local_cluster(3);
    let sample = run_once(&cluster, &small_config(), false).unwrap();
    assert_eq!(sample.bytes_processed, 2 * 3 * 1_000 * 16);
}

#[test]
fn only_the_last_run_is_profiled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profile.json");
    let cluster = local_cluster(2);
    let config = RunConfig {
        runs: 3,
        profile: Some(path.clone()),
        ..small_config()
    };

    let samples = run_all(&cluster, &config).unwrap();
    assert_eq!(samples.len(), 3);

    let artifact: ReportArtifact =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    // The final generic merge produces one task per output partition
    let merges = artifact
        .tasks
        .iter()
        .filter(|t| t.key.starts_with("merge-"))
        .count();
    assert_eq!(merges, 2);
    assert_eq!(artifact.task_count, artifact.tasks.len());
}

#[test]
fn no_profile_path_writes_nothing() {
    let dir = tempdir().unwrap();
    let cluster = local_cluster(2);
    run_all(&cluster, &small_config()).unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn full_report_for_generic_backend() {
    let cluster = local_cluster(2);
    let config = RunConfig {
        markdown: true,
        set_index: true,
        ..small_config()
    };
    let results = run_benchmark(&cluster, &config).unwrap();
    let report = render(&config, &results);

    assert!(report.starts_with("```\nMerge benchmark\n"));
    assert!(report.contains("protocol       | inproc\n"));
    assert!(report.contains("n_workers      | 2\n"));
    assert!(report.contains("set-index      | true\n"));
    assert!(report.contains("data-processed | 62.50 kiB\n"));
    assert!(report.contains("(local-0,local-1)     | "));
    assert!(report.contains("(local-1,local-0)     | "));
}

#[test]
fn explicit_report_omits_transfer_table() {
    let cluster = local_cluster(2);
    let config = RunConfig {
        backend: Backend::Explicit,
        ..small_config()
    };
    let results = run_benchmark(&cluster, &config).unwrap();
    let report = render(&config, &results);
    assert!(report.contains("backend        | explicit\n"));
    assert!(!report.contains("(w1,w2)"));
}

#[test]
fn inproc_address_starts_local_cluster() {
    let args = BenchArgs::try_parse_from([
        "mergebench",
        "--scheduler-addr",
        "inproc://3",
        "--chunk-size",
        "100",
        "--runs",
        "1",
    ])
    .unwrap();
    let config = RunConfig::from_args(&args).unwrap();
    let address = config.scheduler_addr.clone().unwrap();
    let cluster = connect(&address, config.local_cluster_options()).unwrap();
    let results = run_benchmark(&cluster, &config).unwrap();
    assert_eq!(results.n_workers, 3);
    assert_eq!(results.samples[0].bytes_processed, 2 * 3 * 100 * 16);
}

#[test]
fn unsupported_protocol_fails_before_running() {
    let err = connect("smoke://loft", LocalClusterOptions::default()).unwrap_err();
    assert!(matches!(err, ClusterError::UnsupportedProtocol(_)));
}

#[test]
fn invalid_configuration_is_rejected_before_connecting() {
    let args = BenchArgs::try_parse_from(["mergebench", "--runs", "0"]).unwrap();
    assert!(RunConfig::from_args(&args).is_err());
}
