mod batch;
mod config;
mod submitters;

#[cfg(test)]
mod config_test;

use clap::Parser;
use config::SweepConfig;
use std::{path::PathBuf, process::exit};
use submitters::Submitters;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sweep-submitter",
    about = "Submits copies of an experiment-sweep job to a cluster scheduler",
    version
)]
struct Cli {
    /// Path to the sweep configuration file
    #[arg(short, long, default_value = "sweep.yml")]
    config: PathBuf,

    /// Override sweep.id from the configuration
    #[arg(long)]
    sweep: Option<String>,

    /// Override batch.count from the configuration
    #[arg(long)]
    count: Option<usize>,

    /// Override batch.delay_seconds from the configuration
    #[arg(long)]
    delay: Option<u64>,

    /// Override submitter.name from the configuration
    #[arg(long)]
    submitter: Option<String>,

    /// Log the submission commands without running anything
    #[arg(long)]
    dry_run: bool,

    /// Write a YAML receipt of the submission round to this path
    #[arg(long)]
    receipt: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match SweepConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config {}: {e}", cli.config.display());

            exit(1)
        }
    };

    if let Some(sweep) = cli.sweep {
        config.sweep.id = sweep;
    }
    if let Some(count) = cli.count {
        config.batch.count = count;
    }
    if let Some(delay) = cli.delay {
        config.batch.delay_seconds = delay;
    }
    if let Some(submitter) = cli.submitter {
        config.submitter.name = submitter;
    }

    if config.preflight_checks() {
        error!("Aborting the submission round due to the problems above");

        exit(1)
    }

    let mut submitter = match Submitters::load(config, cli.dry_run) {
        Ok(submitter) => submitter,
        Err(e) => {
            error!("Failed to load submitter: {e}");

            exit(1)
        }
    };

    let round = match submitter.submit() {
        Ok(round) => round,
        Err(e) => {
            error!("Submission round failed: {e}");

            exit(1)
        }
    };

    info!(
        "Submitted {} of {} copies for sweep {} from {}",
        round.submitted(),
        round.submissions.len(),
        round.sweep,
        round.host
    );

    if let Some(path) = cli.receipt {
        if let Err(e) = round.write_receipt(&path) {
            error!("Failed to write receipt to {}: {e}", path.display());

            exit(1)
        }
    }

    if round.failed() > 0 {
        exit(1)
    }
}
