//! homeval CLI: runs the housing-price workflow stages from the terminal.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// homeval: reproducible housing-price modelling
#[derive(Parser, Debug)]
#[command(name = "homeval", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run a single processor
    Run {
        /// Job group, e.g. data-cleaning
        job: String,
        /// Processor name within the job, e.g. train-test
        name: String,
    },
    /// Run every stage in dependency order, stopping at the first failure
    RunAll,
    /// List registered processors
    List,
    /// Register a CSV file as a dataset
    Ingest {
        /// CSV file to import
        file: PathBuf,
        /// Dataset name to store it under
        #[arg(long, default_value = "raw/housing")]
        name: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List stored datasets (latest version of each)
    Datasets,
    /// List persisted artifacts
    Artifacts,
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| cli.workspace.clone());

    let filter = match (cli.verbose, cli.quiet) {
        (_, true) => "error",
        (0, false) => "info",
        (1, false) => "debug",
        _ => "trace",
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = workspace.join(".homeval").join("logs");
    let (file_layer, _guard) = if std::fs::create_dir_all(&log_dir).is_ok() {
        let appender = tracing_appender::rolling::daily(&log_dir, "homeval.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new("debug"));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    let overrides = commands::Overrides {
        config: cli.config,
        seed: cli.seed,
    };
    commands::handle_command(cli.command, &workspace, &overrides)
}
