//! numacopy benchmark core
//!
//! Measures device-to-host copy bandwidth into write-combined pinned host
//! memory while the calling thread and its allocations are bound to one NUMA
//! node. A run is a matrix of cases over (NUMA node, GPU, transfer size);
//! every case binds, sets up device and host buffers, times repeated copies
//! with device events, then tears down and unbinds.

pub mod case;
pub mod config;
pub mod error;
pub mod generator;
pub mod harness;
pub mod numa;
pub mod output;
pub mod topology;

pub use case::CaseRunner;
pub use config::{BenchConfig, SizeRange};
pub use error::{CaseError, PreconditionError};
pub use generator::CaseGenerator;
pub use harness::{BenchState, IterationPolicy};
pub use numa::{host_numa, BindError, NumaBinding, NumaControl};
pub use topology::{HostCapabilities, Topology};

use anyhow::Result;
use numacopy_gpu::GpuRuntime;
use numacopy_shared::CaseResult;

/// Probe the host and build the case matrix a configuration selects
pub fn plan<R, N>(gpu: &R, numa: &N, config: &BenchConfig) -> Result<CaseGenerator>
where
    R: GpuRuntime + ?Sized,
    N: NumaControl + ?Sized,
{
    config.validate()?;

    let (topology, capabilities) = Topology::probe(gpu, numa);
    let topology = topology.restrict(config.gpus.as_deref(), config.numa_nodes.as_deref());

    Ok(
        CaseGenerator::new(topology, capabilities, config.sizes.exponents())
            .with_filter(config.filter.clone()),
    )
}

/// Run every selected case, calling `on_result` after each one
///
/// Individual case failures are part of the returned results; only an
/// invalid configuration is an error.
pub fn run_benchmarks<R, N>(
    gpu: &R,
    numa: &N,
    config: &BenchConfig,
    on_result: impl FnMut(&CaseResult),
) -> Result<Vec<CaseResult>>
where
    R: GpuRuntime + ?Sized,
    N: NumaControl + ?Sized,
{
    let generator = plan(gpu, numa, config)?;
    let runner = CaseRunner::new(gpu, numa, config.iteration_policy());
    Ok(generator.run(&runner, on_result)?)
}
