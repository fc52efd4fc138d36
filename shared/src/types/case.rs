//! Measurement case parameters and lifecycle stages
//!
//! A [`MeasurementCase`] only carries parameters: which NUMA node the host
//! side is bound to, which GPU is the copy source, and how many bytes move per
//! iteration. Resources are owned by whoever runs the case.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Family name shared by every case of the device-to-write-combined benchmark
pub const BENCHMARK_NAME: &str = "Comm_NUMAMemcpy_GPUToWC";

/// Name of the size argument in per-size run names
pub const SIZE_ARG_NAME: &str = "log2(N)";

/// Largest accepted transfer size exponent (1 TiB)
pub const MAX_SIZE_EXPONENT: u32 = 40;

/// GPU device ordinal
pub type GpuId = u32;

/// NUMA node identifier
pub type NumaNodeId = u32;

/// Invalid case parameters
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub enum CaseParamError {
    #[error("transfer size exponent {0} exceeds the maximum of {MAX_SIZE_EXPONENT}")]
    SizeExponentTooLarge(u32),
}

/// One point of the NUMA node × GPU × transfer size matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MeasurementCase {
    numa_node_id: NumaNodeId,
    gpu_id: GpuId,
    size_exponent: u32,
}

impl MeasurementCase {
    /// Create a case moving `2^size_exponent` bytes per iteration
    pub fn new(
        numa_node_id: NumaNodeId,
        gpu_id: GpuId,
        size_exponent: u32,
    ) -> Result<Self, CaseParamError> {
        if size_exponent > MAX_SIZE_EXPONENT {
            return Err(CaseParamError::SizeExponentTooLarge(size_exponent));
        }
        Ok(Self {
            numa_node_id,
            gpu_id,
            size_exponent,
        })
    }

    pub fn numa_node_id(&self) -> NumaNodeId {
        self.numa_node_id
    }

    pub fn gpu_id(&self) -> GpuId {
        self.gpu_id
    }

    pub fn size_exponent(&self) -> u32 {
        self.size_exponent
    }

    /// Bytes copied by a single iteration
    pub fn transfer_size_bytes(&self) -> u64 {
        1u64 << self.size_exponent
    }

    /// Result key, `<benchmark>/<numa_id>/<gpu_id>`
    pub fn name(&self) -> String {
        format!("{}/{}/{}", BENCHMARK_NAME, self.numa_node_id, self.gpu_id)
    }

    /// Result key including the size argument
    pub fn run_name(&self) -> String {
        format!("{}/{}:{}", self.name(), SIZE_ARG_NAME, self.size_exponent)
    }
}

impl fmt::Display for MeasurementCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.run_name())
    }
}

/// Lifecycle stage of a running case
///
/// Cases advance `Created → Bound → DeviceReady → HostReady → Measuring`,
/// end in one of `Completed`, `Failed` or `Skipped`, and always finish in
/// `Unbound` once the NUMA binding has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStage {
    Created,
    Bound,
    DeviceReady,
    HostReady,
    Measuring,
    Completed,
    Failed,
    Skipped,
    Unbound,
}

impl CaseStage {
    /// Whether the case outcome is decided at this stage
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for CaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "CREATED",
            Self::Bound => "BOUND",
            Self::DeviceReady => "DEVICE_READY",
            Self::HostReady => "HOST_READY",
            Self::Measuring => "MEASURING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Unbound => "UNBOUND",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_size_is_power_of_two() {
        let case = MeasurementCase::new(1, 0, 20).unwrap();
        assert_eq!(case.transfer_size_bytes(), 1_048_576);
        assert_eq!(case.numa_node_id(), 1);
        assert_eq!(case.gpu_id(), 0);
    }

    #[test]
    fn test_case_names() {
        let case = MeasurementCase::new(1, 3, 8).unwrap();
        assert_eq!(case.name(), "Comm_NUMAMemcpy_GPUToWC/1/3");
        assert_eq!(case.run_name(), "Comm_NUMAMemcpy_GPUToWC/1/3/log2(N):8");
        assert_eq!(case.to_string(), case.run_name());
    }

    #[test]
    fn test_size_exponent_limit() {
        assert!(MeasurementCase::new(0, 0, MAX_SIZE_EXPONENT).is_ok());
        assert_eq!(
            MeasurementCase::new(0, 0, MAX_SIZE_EXPONENT + 1),
            Err(CaseParamError::SizeExponentTooLarge(MAX_SIZE_EXPONENT + 1))
        );
    }

    #[test]
    fn test_terminal_stages() {
        assert!(CaseStage::Completed.is_terminal());
        assert!(CaseStage::Failed.is_terminal());
        assert!(CaseStage::Skipped.is_terminal());
        assert!(!CaseStage::Measuring.is_terminal());
        assert!(!CaseStage::Unbound.is_terminal());
        assert_eq!(CaseStage::DeviceReady.to_string(), "DEVICE_READY");
    }
}
