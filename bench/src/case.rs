//! Measurement case pipeline
//!
//! One case runs bind → device setup → host setup → timed copies → teardown
//! → unbind on the calling thread. Every resource is a scoped owner declared
//! in acquisition order, so teardown happens in reverse on every exit path
//! and the NUMA binding is always the last thing released.

use numacopy_gpu::{DeviceBuffer, GpuRuntime, HostBuffer, TransferTimer};
use numacopy_shared::{CaseOutcome, CaseResult, CaseStage, Measurement, MeasurementCase};
use tracing::{debug, info, warn};

use crate::error::{describe, CaseError};
use crate::harness::{BenchState, IterationPolicy};
use crate::numa::{NumaBinding, NumaControl};

/// Stage tracking of a running case
struct Progress<'c> {
    case: &'c MeasurementCase,
    stage: CaseStage,
    iterations: u64,
}

impl<'c> Progress<'c> {
    fn new(case: &'c MeasurementCase) -> Self {
        Self {
            case,
            stage: CaseStage::Created,
            iterations: 0,
        }
    }

    fn advance(&mut self, next: CaseStage) {
        debug!("{}: {} -> {}", self.case, self.stage, next);
        self.stage = next;
    }
}

/// Runs measurement cases against one GPU runtime and NUMA controller
pub struct CaseRunner<'a, R: GpuRuntime + ?Sized, N: NumaControl + ?Sized> {
    gpu: &'a R,
    numa: &'a N,
    policy: IterationPolicy,
}

impl<'a, R: GpuRuntime + ?Sized, N: NumaControl + ?Sized> CaseRunner<'a, R, N> {
    pub fn new(gpu: &'a R, numa: &'a N, policy: IterationPolicy) -> Self {
        Self { gpu, numa, policy }
    }

    pub fn policy(&self) -> IterationPolicy {
        self.policy
    }

    /// Run one case to completion
    ///
    /// Never fails: errors become a failed or skipped outcome and the
    /// binding is released before this returns.
    pub fn run(&self, case: &MeasurementCase) -> CaseResult {
        info!("running {}", case);

        let mut progress = Progress::new(case);
        let outcome = match self.execute(&mut progress) {
            Ok(measurement) => {
                progress.advance(CaseStage::Completed);
                info!(
                    "{}: {} iterations, {:.3} GB/s",
                    case,
                    measurement.iterations,
                    measurement.bytes_per_second() / 1e9
                );
                CaseOutcome::Completed(measurement)
            }
            Err(err) => {
                let reason = describe(&err);
                warn!("{}: {}", case, reason);
                if err.is_measurement_failure() {
                    progress.advance(CaseStage::Failed);
                    CaseOutcome::Failed {
                        stage: err.stage(),
                        reason,
                        iterations_completed: progress.iterations,
                    }
                } else {
                    progress.advance(CaseStage::Skipped);
                    CaseOutcome::Skipped {
                        stage: err.stage(),
                        reason,
                    }
                }
            }
        };
        progress.advance(CaseStage::Unbound);

        CaseResult::new(*case, outcome)
    }

    fn execute(&self, progress: &mut Progress<'_>) -> Result<Measurement, CaseError> {
        let case = progress.case;
        let node = case.numa_node_id();
        let device = case.gpu_id();
        let bytes = case.transfer_size_bytes();

        let _binding = NumaBinding::bind(self.numa, node)
            .map_err(|source| CaseError::Topology { node, source })?;
        progress.advance(CaseStage::Bound);

        self.gpu
            .reset_device(device)
            .map_err(CaseError::DeviceReset)?;
        self.gpu
            .set_device(device)
            .map_err(CaseError::DeviceSelect)?;
        let mut src = DeviceBuffer::allocate(self.gpu, bytes).map_err(CaseError::DeviceAlloc)?;
        src.fill(0).map_err(CaseError::DeviceFill)?;
        progress.advance(CaseStage::DeviceReady);

        let dst =
            HostBuffer::allocate_write_combined(self.gpu, bytes).map_err(CaseError::HostAlloc)?;
        progress.advance(CaseStage::HostReady);

        let timer = TransferTimer::new(self.gpu).map_err(CaseError::TimerCreate)?;
        progress.advance(CaseStage::Measuring);

        let mut state = BenchState::new(self.policy, bytes);
        while state.keep_running() {
            let sample = timer.time_copy(&dst, &src)?;
            state.record(&sample);
            progress.iterations = state.iterations();
        }
        debug!(
            "{}: {} bytes processed in {} iterations",
            case,
            state.bytes_processed(),
            state.iterations()
        );

        Ok(state.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numa::SimulatedNuma;
    use numacopy_gpu::sim::{Fault, FaultPoint, SimCall, SimulatedGpu};

    fn case(numa: u32, gpu: u32, exp: u32) -> MeasurementCase {
        MeasurementCase::new(numa, gpu, exp).unwrap()
    }

    #[test]
    fn test_successful_case() {
        let gpu = SimulatedGpu::new(1);
        let numa = SimulatedNuma::new(vec![0, 1]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(4));

        let result = runner.run(&case(1, 0, 20));
        let m = result.measurement().expect("case should complete");
        assert_eq!(m.iterations, 4);
        assert_eq!(m.bytes_processed, 4 << 20);
        assert!(m.bytes_per_second() > 0.0);
        assert_eq!(result.counters.numa_id, 1);

        assert_eq!(numa.bound_node(), None);
        assert_eq!(gpu.live_device_allocations(), 0);
        assert_eq!(gpu.live_host_allocations(), 0);
        assert_eq!(gpu.live_events(), 0);
    }

    #[test]
    fn test_setup_order() {
        let gpu = SimulatedGpu::new(1);
        let numa = SimulatedNuma::new(vec![0]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(1));
        runner.run(&case(0, 0, 10));

        let calls = gpu.calls();
        let pos = |c: &SimCall| calls.iter().position(|x| x == c).unwrap();
        assert!(pos(&SimCall::Reset(0)) < pos(&SimCall::SetDevice(0)));
        assert!(pos(&SimCall::SetDevice(0)) < pos(&SimCall::MallocDevice(1024)));
        assert!(pos(&SimCall::MallocDevice(1024)) < pos(&SimCall::MemsetDevice(1024)));
        assert!(pos(&SimCall::MemsetDevice(1024)) < pos(&SimCall::HostAlloc(1024)));
        assert!(pos(&SimCall::HostAlloc(1024)) < pos(&SimCall::MemcpyDtoH(1024)));
    }

    #[test]
    fn test_bind_failure_skips_before_any_gpu_call() {
        let gpu = SimulatedGpu::new(1);
        let numa = SimulatedNuma::new(vec![0]).with_failing_node(0);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(1));

        let result = runner.run(&case(0, 0, 10));
        assert!(matches!(
            result.outcome,
            CaseOutcome::Skipped {
                stage: CaseStage::Created,
                ..
            }
        ));
        assert!(gpu.calls().is_empty());
        assert_eq!(numa.unbind_count(), 1);
    }

    #[test]
    fn test_device_fill_failure_releases_device_buffer() {
        let gpu = SimulatedGpu::new(1).with_fault(FaultPoint::DeviceFill);
        let numa = SimulatedNuma::new(vec![0]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(1));

        let result = runner.run(&case(0, 0, 10));
        assert!(result
            .error_message()
            .unwrap()
            .contains("failed to perform cudaMemset"));
        assert_eq!(gpu.device_allocations_total(), 1);
        assert_eq!(gpu.live_device_allocations(), 0);
        assert_eq!(gpu.call_count(|c| matches!(c, SimCall::HostAlloc(_))), 0);
        assert_eq!(numa.bound_node(), None);
    }

    #[test]
    fn test_timer_failure_is_a_setup_failure() {
        let gpu = SimulatedGpu::new(1).with_fault(FaultPoint::EventCreate);
        let numa = SimulatedNuma::new(vec![0]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(1));

        let result = runner.run(&case(0, 0, 10));
        assert!(matches!(
            result.outcome,
            CaseOutcome::Skipped {
                stage: CaseStage::HostReady,
                ..
            }
        ));
        assert_eq!(gpu.live_host_allocations(), 0);
    }

    #[test]
    fn test_copy_failure_mid_measurement() {
        let gpu = SimulatedGpu::new(1).with(Fault::new(FaultPoint::Copy).after(3));
        let numa = SimulatedNuma::new(vec![0]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(10));

        let result = runner.run(&case(0, 0, 12));
        match &result.outcome {
            CaseOutcome::Failed {
                stage,
                reason,
                iterations_completed,
            } => {
                assert_eq!(*stage, CaseStage::Measuring);
                assert!(reason.contains("failed to perform memcpy"));
                assert_eq!(*iterations_completed, 3);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        // Three successful iterations read their elapsed time, the failed one does not
        assert_eq!(gpu.call_count(|c| matches!(c, SimCall::ElapsedTime)), 3);
        assert_eq!(gpu.call_count(|c| matches!(c, SimCall::MemcpyDtoH(_))), 4);
        assert_eq!(numa.bound_node(), None);
        assert_eq!(gpu.live_host_allocations(), 0);
    }

    #[test]
    fn test_set_device_failure_allocates_nothing() {
        let gpu = SimulatedGpu::new(1).with_fault(FaultPoint::SetDevice);
        let numa = SimulatedNuma::new(vec![0]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(1));

        let result = runner.run(&case(0, 0, 10));
        assert!(matches!(
            result.outcome,
            CaseOutcome::Skipped {
                stage: CaseStage::Bound,
                ..
            }
        ));
        assert!(result
            .error_message()
            .unwrap()
            .starts_with("Comm_NUMAMemcpy_GPUToWC failed to set CUDA device"));
        assert_eq!(gpu.device_allocations_total(), 0);
        assert_eq!(gpu.host_allocations_total(), 0);
        assert_eq!(numa.bound_node(), None);
    }

    #[test]
    fn test_device_alloc_failure_skips_host_setup() {
        let gpu = SimulatedGpu::new(1).with_fault(FaultPoint::DeviceAlloc);
        let numa = SimulatedNuma::new(vec![0]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(1));

        let result = runner.run(&case(0, 0, 10));
        assert!(matches!(
            result.outcome,
            CaseOutcome::Skipped {
                stage: CaseStage::Bound,
                ..
            }
        ));
        assert!(result
            .error_message()
            .unwrap()
            .starts_with("Comm_NUMAMemcpy_GPUToWC failed to perform cudaMalloc"));
        assert_eq!(gpu.device_allocations_total(), 0);
        assert_eq!(gpu.host_allocations_total(), 0);
        assert_eq!(numa.bound_node(), None);
    }

    #[test]
    fn test_host_alloc_failure_releases_device_buffer() {
        let gpu = SimulatedGpu::new(1).with_fault(FaultPoint::HostAlloc);
        let numa = SimulatedNuma::new(vec![0, 1]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(1));

        let result = runner.run(&case(1, 0, 10));
        assert!(matches!(
            result.outcome,
            CaseOutcome::Skipped {
                stage: CaseStage::DeviceReady,
                ..
            }
        ));
        assert!(result
            .error_message()
            .unwrap()
            .starts_with("Comm_NUMAMemcpy_GPUToWC failed to perform pinned cudaHostAlloc"));
        assert_eq!(gpu.device_allocations_total(), 1);
        assert_eq!(gpu.live_device_allocations(), 0);
        assert_eq!(gpu.live_host_allocations(), 0);
        assert_eq!(gpu.live_events(), 0);
        assert_eq!(numa.bound_node(), None);
        assert_eq!(numa.unbind_count(), 1);
    }

    #[test]
    fn test_elapsed_read_failure_mid_measurement() {
        let gpu = SimulatedGpu::new(1).with(Fault::new(FaultPoint::ElapsedTime).after(2));
        let numa = SimulatedNuma::new(vec![0]);
        let runner = CaseRunner::new(&gpu, &numa, IterationPolicy::Fixed(10));

        let result = runner.run(&case(0, 0, 12));
        match &result.outcome {
            CaseOutcome::Failed {
                stage,
                reason,
                iterations_completed,
            } => {
                assert_eq!(*stage, CaseStage::Measuring);
                assert!(reason.starts_with("Comm_NUMAMemcpy_GPUToWC failed to get elapsed time"));
                assert_eq!(*iterations_completed, 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(result.measurement().is_none());
        assert_eq!(gpu.call_count(|c| matches!(c, SimCall::MemcpyDtoH(_))), 3);
        assert_eq!(gpu.live_device_allocations(), 0);
        assert_eq!(gpu.live_host_allocations(), 0);
        assert_eq!(gpu.live_events(), 0);
        assert_eq!(numa.bound_node(), None);
    }
}
