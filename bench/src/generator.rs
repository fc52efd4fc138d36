//! Case generation over the GPU × NUMA node × size matrix

use numacopy_gpu::GpuRuntime;
use numacopy_shared::{CaseOutcome, CaseParamError, CaseResult, CaseStage, MeasurementCase};
use tracing::{info, warn};

use crate::case::CaseRunner;
use crate::error::describe;
use crate::numa::NumaControl;
use crate::topology::{HostCapabilities, Topology};

/// Builds and runs one case per (NUMA node, GPU, size) combination
#[derive(Debug, Clone)]
pub struct CaseGenerator {
    topology: Topology,
    capabilities: HostCapabilities,
    size_exponents: Vec<u32>,
    filter: Option<String>,
}

impl CaseGenerator {
    pub fn new(
        topology: Topology,
        capabilities: HostCapabilities,
        size_exponents: Vec<u32>,
    ) -> Self {
        Self {
            topology,
            capabilities,
            size_exponents,
            filter: None,
        }
    }

    /// Only keep cases whose run name contains `filter`
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|f| !f.is_empty());
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    /// Cases in execution order: GPU, then NUMA node, then size
    pub fn cases(&self) -> Result<Vec<MeasurementCase>, CaseParamError> {
        let mut cases = Vec::new();
        for (numa, gpu) in self.topology.pairs() {
            for &exp in &self.size_exponents {
                let case = MeasurementCase::new(numa, gpu, exp)?;
                if self
                    .filter
                    .as_deref()
                    .map_or(true, |f| case.run_name().contains(f))
                {
                    cases.push(case);
                }
            }
        }
        Ok(cases)
    }

    /// Run every case, reporting each result as soon as it is available
    ///
    /// A failed precondition skips the whole matrix without touching the
    /// GPU or the NUMA policy. Otherwise each case runs independently and a
    /// failing case never stops the ones after it.
    pub fn run<R, N>(
        &self,
        runner: &CaseRunner<'_, R, N>,
        mut on_result: impl FnMut(&CaseResult),
    ) -> Result<Vec<CaseResult>, CaseParamError>
    where
        R: GpuRuntime + ?Sized,
        N: NumaControl + ?Sized,
    {
        let cases = self.cases()?;
        info!("{} case(s) selected", cases.len());

        let precondition = self.capabilities.check().map_err(|e| describe(&e));
        if let Err(reason) = &precondition {
            warn!("skipping all cases: {}", reason);
        }

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let result = match &precondition {
                Ok(()) => runner.run(&case),
                Err(reason) => CaseResult::new(
                    case,
                    CaseOutcome::Skipped {
                        stage: CaseStage::Created,
                        reason: reason.clone(),
                    },
                ),
            };
            on_result(&result);
            results.push(result);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::IterationPolicy;
    use crate::numa::SimulatedNuma;
    use numacopy_gpu::sim::SimulatedGpu;

    const ALL: HostCapabilities = HostCapabilities {
        has_gpu: true,
        has_numa: true,
    };

    #[test]
    fn test_case_order() {
        let gen = CaseGenerator::new(Topology::new(vec![0, 1], vec![0, 1]), ALL, vec![8, 10]);
        let names: Vec<_> = gen.cases().unwrap().iter().map(|c| c.run_name()).collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "Comm_NUMAMemcpy_GPUToWC/0/0/log2(N):8");
        assert_eq!(names[1], "Comm_NUMAMemcpy_GPUToWC/0/0/log2(N):10");
        assert_eq!(names[2], "Comm_NUMAMemcpy_GPUToWC/1/0/log2(N):8");
        assert_eq!(names[4], "Comm_NUMAMemcpy_GPUToWC/0/1/log2(N):8");
        assert_eq!(names[7], "Comm_NUMAMemcpy_GPUToWC/1/1/log2(N):10");
    }

    #[test]
    fn test_filter() {
        let gen = CaseGenerator::new(Topology::new(vec![0, 1], vec![0, 1]), ALL, vec![8, 10])
            .with_filter(Some("/1/0/".to_string()));
        let cases = gen.cases().unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.numa_node_id() == 1 && c.gpu_id() == 0));
    }

    #[test]
    fn test_invalid_size_is_rejected() {
        let gen = CaseGenerator::new(Topology::new(vec![0], vec![0]), ALL, vec![64]);
        assert_eq!(
            gen.cases().unwrap_err(),
            CaseParamError::SizeExponentTooLarge(64)
        );
    }

    #[test]
    fn test_results_are_streamed() {
        let gpu = SimulatedGpu::new(1);
        let numa = SimulatedNuma::new(vec![0]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(1));
        let gen = CaseGenerator::new(Topology::new(vec![0], vec![0]), ALL, vec![8, 9, 10]);

        let mut seen = Vec::new();
        let results = gen.run(&runner, |r| seen.push(r.run_name.clone())).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(seen.len(), 3);
        assert!(results.iter().all(CaseResult::is_success));
    }
}
