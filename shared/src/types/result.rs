//! Case outcomes and results
//!
//! These types are the unit exposed to reporters: one [`CaseResult`] per
//! measurement case, whether it completed, failed mid-measurement or was
//! skipped before any sample was taken.

use serde::{Deserialize, Serialize};

use super::case::{CaseStage, GpuId, MeasurementCase, NumaNodeId};
use super::stats::RunningStats;

/// Aggregate of the timing samples of a completed case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Number of completed iterations
    pub iterations: u64,

    /// Sum of the per-iteration times, in seconds
    pub total_time_secs: f64,

    /// Mean time per iteration, in seconds
    pub mean_time_secs: f64,

    /// Sample standard deviation of the time per iteration, in seconds
    pub stddev_time_secs: f64,

    /// Fastest iteration, in seconds
    pub min_time_secs: f64,

    /// Slowest iteration, in seconds
    pub max_time_secs: f64,

    /// Bytes moved across all completed iterations
    pub bytes_processed: u64,
}

impl Measurement {
    /// Build a measurement from the running statistics of a case
    pub fn from_stats(stats: &RunningStats, bytes_per_iteration: u64) -> Self {
        Self {
            iterations: stats.count(),
            total_time_secs: stats.sum(),
            mean_time_secs: stats.mean(),
            stddev_time_secs: stats.stddev(),
            min_time_secs: stats.min().unwrap_or(0.0),
            max_time_secs: stats.max().unwrap_or(0.0),
            bytes_processed: bytes_per_iteration.saturating_mul(stats.count()),
        }
    }

    /// Aggregate throughput (0.0 if no time was recorded)
    pub fn bytes_per_second(&self) -> f64 {
        if self.total_time_secs > 0.0 {
            self.bytes_processed as f64 / self.total_time_secs
        } else {
            0.0
        }
    }
}

/// How a case ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseOutcome {
    /// Every requested iteration ran
    Completed(Measurement),

    /// Measurement started but an iteration failed; samples are discarded
    Failed {
        stage: CaseStage,
        reason: String,
        iterations_completed: u64,
    },

    /// Setup or a global precondition failed; no sample was taken
    Skipped { stage: CaseStage, reason: String },
}

impl CaseOutcome {
    pub fn stage(&self) -> CaseStage {
        match self {
            Self::Completed(_) => CaseStage::Completed,
            Self::Failed { stage, .. } | Self::Skipped { stage, .. } => *stage,
        }
    }
}

/// Metadata counters attached to every result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub bytes: u64,
    pub cuda_id: GpuId,
    pub numa_id: NumaNodeId,
}

impl From<&MeasurementCase> for Counters {
    fn from(case: &MeasurementCase) -> Self {
        Self {
            bytes: case.transfer_size_bytes(),
            cuda_id: case.gpu_id(),
            numa_id: case.numa_node_id(),
        }
    }
}

/// Result record of one measurement case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    /// `<benchmark>/<numa_id>/<gpu_id>`
    pub name: String,

    /// Name including the size argument
    pub run_name: String,

    pub case: MeasurementCase,

    pub counters: Counters,

    pub outcome: CaseOutcome,
}

impl CaseResult {
    pub fn new(case: MeasurementCase, outcome: CaseOutcome) -> Self {
        Self {
            name: case.name(),
            run_name: case.run_name(),
            counters: Counters::from(&case),
            case,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Completed(_))
    }

    pub fn measurement(&self) -> Option<&Measurement> {
        match &self.outcome {
            CaseOutcome::Completed(m) => Some(m),
            _ => None,
        }
    }

    /// Human-readable reason for failed and skipped cases
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            CaseOutcome::Completed(_) => None,
            CaseOutcome::Failed { reason, .. } | CaseOutcome::Skipped { reason, .. } => {
                Some(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_from_stats() {
        let mut stats = RunningStats::new();
        stats.push(0.001);
        stats.push(0.003);

        let m = Measurement::from_stats(&stats, 1 << 20);
        assert_eq!(m.iterations, 2);
        assert_eq!(m.bytes_processed, 2 << 20);
        assert!((m.mean_time_secs - 0.002).abs() < 1e-12);
        assert!((m.bytes_per_second() - (2u64 << 20) as f64 / 0.004).abs() < 1e-3);
    }

    #[test]
    fn test_empty_measurement_has_zero_throughput() {
        let m = Measurement::from_stats(&RunningStats::new(), 4096);
        assert_eq!(m.bytes_processed, 0);
        assert_eq!(m.bytes_per_second(), 0.0);
    }

    #[test]
    fn test_result_metadata() {
        let case = MeasurementCase::new(1, 0, 20).unwrap();
        let result = CaseResult::new(
            case,
            CaseOutcome::Skipped {
                stage: CaseStage::Created,
                reason: "Comm_NUMAMemcpy_GPUToWC NUMA not available".to_string(),
            },
        );

        assert!(!result.is_success());
        assert_eq!(result.name, "Comm_NUMAMemcpy_GPUToWC/1/0");
        assert_eq!(result.counters.bytes, 1_048_576);
        assert_eq!(result.counters.cuda_id, 0);
        assert_eq!(result.counters.numa_id, 1);
        assert_eq!(result.outcome.stage(), CaseStage::Created);
        assert!(result.error_message().unwrap().contains("NUMA not available"));
        assert!(result.measurement().is_none());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = CaseOutcome::Failed {
            stage: CaseStage::Measuring,
            reason: "copy failed".to_string(),
            iterations_completed: 3,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "MEASURING");
        assert_eq!(json["iterations_completed"], 3);
    }
}
