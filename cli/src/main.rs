//! CLI for numacopy
//!
//! Supports three commands:
//! - run: Measure the NUMA node × GPU × size matrix and report it
//! - list: Print the cases a run would execute
//! - topology: Show the GPUs and NUMA nodes found on this host

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod backend;
mod commands;
mod output;

#[derive(Parser)]
#[command(name = "numacopy")]
#[command(about = "numacopy - NUMA-bound GPU to write-combined host copy bandwidth", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark matrix
    Run(commands::run::RunArgs),

    /// List the cases a run would execute
    List(commands::list::ListArgs),

    /// Show host GPUs and NUMA nodes
    Topology(commands::topology::TopologyArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::List(args) => commands::list::run(args),
        Commands::Topology(args) => commands::topology::run(args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries the report only
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
