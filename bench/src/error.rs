//! Error types for the measurement pipeline

use std::error::Error as _;

use numacopy_gpu::{GpuError, TimerError};
use numacopy_shared::{CaseStage, NumaNodeId, BENCHMARK_NAME};
use thiserror::Error;

use crate::numa::BindError;

/// Host-wide condition that prevents every case from running
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub enum PreconditionError {
    #[error("no CUDA device found")]
    NoGpu,

    #[error("NUMA not available")]
    NoNuma,
}

/// Failure of one measurement case
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("failed to bind to NUMA node {node}")]
    Topology {
        node: NumaNodeId,
        #[source]
        source: BindError,
    },

    #[error("failed to reset CUDA device")]
    DeviceReset(#[source] GpuError),

    #[error("failed to set CUDA device")]
    DeviceSelect(#[source] GpuError),

    #[error("failed to perform cudaMalloc")]
    DeviceAlloc(#[source] GpuError),

    #[error("failed to perform cudaMemset")]
    DeviceFill(#[source] GpuError),

    #[error("failed to perform pinned cudaHostAlloc")]
    HostAlloc(#[source] GpuError),

    #[error("failed to create timing events")]
    TimerCreate(#[source] GpuError),

    #[error("failed to perform memcpy")]
    Transfer(#[source] GpuError),

    #[error("failed to get elapsed time")]
    TimerRead(#[source] GpuError),
}

impl CaseError {
    /// Last stage the case reached before this error
    pub fn stage(&self) -> CaseStage {
        match self {
            Self::Topology { .. } => CaseStage::Created,
            Self::DeviceReset(_)
            | Self::DeviceSelect(_)
            | Self::DeviceAlloc(_)
            | Self::DeviceFill(_) => CaseStage::Bound,
            Self::HostAlloc(_) => CaseStage::DeviceReady,
            Self::TimerCreate(_) => CaseStage::HostReady,
            Self::Transfer(_) | Self::TimerRead(_) => CaseStage::Measuring,
        }
    }

    /// Whether the error interrupted sampling, as opposed to setup
    pub fn is_measurement_failure(&self) -> bool {
        self.stage() == CaseStage::Measuring
    }
}

impl From<TimerError> for CaseError {
    fn from(e: TimerError) -> Self {
        match e {
            TimerError::Transfer(source) => Self::Transfer(source),
            TimerError::ElapsedRead(source) => Self::TimerRead(source),
        }
    }
}

/// Benchmark-prefixed message with the underlying cause, if any
pub fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    match err.source() {
        Some(cause) => format!("{} {} ({})", BENCHMARK_NAME, err, cause),
        None => format!("{} {}", BENCHMARK_NAME, err),
    }
}
