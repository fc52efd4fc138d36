//! Host topology probe
//!
//! Discovers the GPU ids and NUMA node ids the benchmark matrix is built
//! from, and the two host-wide facts the matrix depends on: whether any GPU is
//! present and whether NUMA policy can be controlled. Both are computed once
//! and then injected into the case generator.

use numacopy_gpu::GpuRuntime;
use numacopy_shared::{GpuId, NumaNodeId};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PreconditionError;
use crate::numa::NumaControl;

/// Host-wide preconditions, computed once per process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostCapabilities {
    pub has_gpu: bool,
    pub has_numa: bool,
}

impl HostCapabilities {
    /// Check GPU presence first, then NUMA support
    pub fn check(&self) -> Result<(), PreconditionError> {
        if !self.has_gpu {
            return Err(PreconditionError::NoGpu);
        }
        if !self.has_numa {
            return Err(PreconditionError::NoNuma);
        }
        Ok(())
    }
}

/// Ordered GPU and NUMA node ids available for measurement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Topology {
    gpu_ids: Vec<GpuId>,
    numa_ids: Vec<NumaNodeId>,
}

impl Topology {
    pub fn new(mut gpu_ids: Vec<GpuId>, mut numa_ids: Vec<NumaNodeId>) -> Self {
        gpu_ids.sort_unstable();
        gpu_ids.dedup();
        numa_ids.sort_unstable();
        numa_ids.dedup();
        Self { gpu_ids, numa_ids }
    }

    /// Query the GPU runtime and NUMA controller of the host
    ///
    /// Probe failures degrade to "absent" rather than erroring out: a failing
    /// device count means no GPU. A host without NUMA control whose node list
    /// cannot be read is treated as a single node 0; with NUMA control an
    /// empty node list stays empty.
    pub fn probe<R, N>(gpu: &R, numa: &N) -> (Self, HostCapabilities)
    where
        R: GpuRuntime + ?Sized,
        N: NumaControl + ?Sized,
    {
        let device_count = gpu.device_count().unwrap_or_else(|e| {
            warn!("cannot query {} devices: {}", gpu.name(), e);
            0
        });

        let has_numa = numa.is_available();
        let mut numa_ids = numa.nodes().unwrap_or_else(|e| {
            warn!("cannot list NUMA nodes: {}", e);
            Vec::new()
        });
        // Without NUMA control the matrix still lists node 0 so its cases
        // can be reported as skipped
        if numa_ids.is_empty() && !has_numa {
            numa_ids.push(0);
        }

        let capabilities = HostCapabilities {
            has_gpu: device_count > 0,
            has_numa,
        };
        let topology = Self::new((0..device_count).collect(), numa_ids);
        info!(
            "found {} {} device(s), NUMA nodes {:?} (NUMA control {})",
            device_count,
            gpu.name(),
            topology.numa_ids,
            if capabilities.has_numa {
                "available"
            } else {
                "unavailable"
            }
        );

        (topology, capabilities)
    }

    /// Keep only the listed ids; `None` keeps everything
    ///
    /// Requested ids that the host does not have are dropped with a warning.
    pub fn restrict(self, gpus: Option<&[GpuId]>, numa_nodes: Option<&[NumaNodeId]>) -> Self {
        fn keep(available: Vec<u32>, wanted: Option<&[u32]>, what: &str) -> Vec<u32> {
            let Some(wanted) = wanted else {
                return available;
            };
            for id in wanted.iter().filter(|&&id| !available.contains(&id)) {
                warn!("requested {} {} is not present, ignoring it", what, id);
            }
            available.into_iter().filter(|id| wanted.contains(id)).collect()
        }

        Self {
            gpu_ids: keep(self.gpu_ids, gpus, "GPU"),
            numa_ids: keep(self.numa_ids, numa_nodes, "NUMA node"),
        }
    }

    pub fn gpu_ids(&self) -> &[GpuId] {
        &self.gpu_ids
    }

    pub fn numa_ids(&self) -> &[NumaNodeId] {
        &self.numa_ids
    }

    /// `(numa_id, gpu_id)` pairs, GPU outer
    pub fn pairs(&self) -> impl Iterator<Item = (NumaNodeId, GpuId)> + '_ {
        self.gpu_ids
            .iter()
            .flat_map(move |&gpu| self.numa_ids.iter().map(move |&numa| (numa, gpu)))
    }
}
