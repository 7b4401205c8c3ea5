//! mergebench - distributed equal-join benchmark
//!
//! Prints the report on stdout; logs go to stderr.

use clap::Parser;
use mergebench::bench::{render, run_benchmark};
use mergebench::{connect, BenchArgs, LocalCluster, Result, RunConfig};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let args = BenchArgs::parse();

    // RUST_LOG takes precedence over --log-level
    let log_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Benchmark failed");
            eprintln!("mergebench failed: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: &BenchArgs) -> Result<()> {
    let config = RunConfig::from_args(args)?;

    let cluster = match &config.scheduler_addr {
        Some(address) => {
            info!(%address, "Connecting to scheduler");
            connect(address, config.local_cluster_options())?
        }
        None => LocalCluster::start(config.local_cluster_options())?,
    };

    let results = run_benchmark(&cluster, &config)?;
    print!("{}", render(&config, &results));
    Ok(())
}
