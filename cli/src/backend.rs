//! GPU back end selection

use anyhow::Result;
use clap::ValueEnum;
use numacopy_bench::numa::{host_numa, SimulatedNuma};
use numacopy_bench::NumaControl;
use numacopy_gpu::sim::SimulatedGpu;
use numacopy_gpu::GpuRuntime;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// CUDA runtime (requires the `cuda` feature)
    Cuda,
    /// Simulated GPU and NUMA control, for dry runs
    Sim,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "cuda") {
            Self::Cuda
        } else {
            Self::Sim
        }
    }
}

/// GPU runtime and NUMA controller a command runs against
pub struct Backend {
    pub gpu: Box<dyn GpuRuntime>,
    pub numa: Box<dyn NumaControl>,
}

impl Backend {
    /// Open the requested back end
    ///
    /// The simulated back end mirrors the host's NUMA node ids but never
    /// changes the real memory policy.
    pub fn open(kind: BackendKind, sim_devices: u32) -> Result<Self> {
        debug!("opening {:?} back end", kind);
        match kind {
            BackendKind::Cuda => open_cuda(),
            BackendKind::Sim => {
                let nodes = host_numa().nodes().unwrap_or_default();
                let nodes = if nodes.is_empty() { vec![0] } else { nodes };
                Ok(Self {
                    gpu: Box::new(SimulatedGpu::new(sim_devices)),
                    numa: Box::new(SimulatedNuma::new(nodes)),
                })
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.gpu.name()
    }
}

#[cfg(feature = "cuda")]
fn open_cuda() -> Result<Backend> {
    Ok(Backend {
        gpu: Box::new(numacopy_gpu::cuda::CudaRuntime::new()),
        numa: host_numa(),
    })
}

#[cfg(not(feature = "cuda"))]
fn open_cuda() -> Result<Backend> {
    anyhow::bail!("numacopy was built without CUDA support (rebuild with --features cuda)")
}
