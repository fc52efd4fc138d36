//! Run command implementation

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use numacopy_bench::output::{generate_json, ConsoleReporter, JsonReport, ReportContext};
use tracing::warn;

use super::{parse_min_time, BackendArgs, SelectionArgs};
use crate::backend::Backend;
use crate::output::{self, Level};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Minimum measured time per case (e.g., "500ms", "2s")
    #[arg(long, value_parser = parse_min_time)]
    pub min_time: Option<Duration>,

    /// Run exactly this many iterations per case
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Iteration cap when running for a minimum time
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Also write the results in JSON format
    #[arg(long)]
    pub json: Option<PathBuf>,
}

pub fn run(args: RunArgs) -> Result<()> {
    let mut config = args.selection.load_config()?;
    if let Some(min_time) = args.min_time {
        config.min_time = min_time;
    }
    if args.iterations.is_some() {
        config.iterations = args.iterations;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }
    if args.json.is_some() {
        config.json_output = args.json;
    }
    config.validate()?;

    let backend = Backend::open(args.backend.backend, args.backend.sim_devices)?;

    let stdout = std::io::stdout();
    let mut console = ConsoleReporter::new(stdout.lock());
    let results = numacopy_bench::run_benchmarks(&*backend.gpu, &*backend.numa, &config, |r| {
        if let Err(e) = console.report(r) {
            warn!("failed to print {}: {:#}", r.run_name, e);
        }
    })?;
    console.summary(&results)?;

    if let Some(path) = &config.json_output {
        let report = JsonReport::new(ReportContext::current(backend.name()), &results);
        generate_json(&report, path)?;
    }

    if results.is_empty() {
        output::notice(Level::Warn, "no cases were selected");
    }

    Ok(())
}
