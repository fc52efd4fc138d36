//! Topology command implementation

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use numacopy_bench::{HostCapabilities, Topology};
use serde::Serialize;

use super::BackendArgs;
use crate::backend::Backend;
use crate::output::{self, Level};

#[derive(Args, Debug)]
pub struct TopologyArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct TopologyReport<'a> {
    backend: &'a str,
    topology: &'a Topology,
    capabilities: HostCapabilities,
}

pub fn run(args: TopologyArgs) -> Result<()> {
    let backend = Backend::open(args.backend.backend, args.backend.sim_devices)?;
    let (topology, capabilities) = Topology::probe(&*backend.gpu, &*backend.numa);

    if args.json {
        let report = TopologyReport {
            backend: backend.name(),
            topology: &topology,
            capabilities,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize topology")?
        );
        return Ok(());
    }

    println!("{:<16} {}", "Backend:".bold(), backend.name());
    println!("{:<16} {:?}", "GPUs:".bold(), topology.gpu_ids());
    println!("{:<16} {:?}", "NUMA nodes:".bold(), topology.numa_ids());

    match capabilities.check() {
        Ok(()) => output::notice(Level::Ok, "host can run the benchmark"),
        Err(e) => output::notice(Level::Fail, e),
    }

    Ok(())
}
