//! Iteration control and sample accounting
//!
//! Time is supplied manually, one device-measured duration per iteration.
//! Samples are folded into running statistics as they arrive.

use std::time::Duration;

use numacopy_gpu::TimingSample;
use numacopy_shared::{Measurement, RunningStats};

/// Default minimum accumulated time per case
pub const DEFAULT_MIN_TIME: Duration = Duration::from_millis(500);

/// Default iteration cap for time-based runs
pub const DEFAULT_MAX_ITERATIONS: u64 = 1_000_000_000;

/// How many iterations a case runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationPolicy {
    /// Exactly this many iterations
    Fixed(u64),

    /// Iterate until the measured time reaches `min_time`, at most
    /// `max_iterations` times
    MinTime {
        min_time: Duration,
        max_iterations: u64,
    },
}

impl Default for IterationPolicy {
    fn default() -> Self {
        Self::MinTime {
            min_time: DEFAULT_MIN_TIME,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Iteration loop state of one case
#[derive(Debug, Clone)]
pub struct BenchState {
    policy: IterationPolicy,
    bytes_per_iteration: u64,
    stats: RunningStats,
}

impl BenchState {
    pub fn new(policy: IterationPolicy, bytes_per_iteration: u64) -> Self {
        Self {
            policy,
            bytes_per_iteration,
            stats: RunningStats::new(),
        }
    }

    /// Whether another iteration should run
    pub fn keep_running(&self) -> bool {
        let done = self.stats.count();
        match self.policy {
            IterationPolicy::Fixed(n) => done < n,
            IterationPolicy::MinTime {
                min_time,
                max_iterations,
            } => done < max_iterations && self.stats.sum() < min_time.as_secs_f64(),
        }
    }

    /// Account one completed iteration
    pub fn record(&mut self, sample: &TimingSample) {
        self.set_iteration_time(sample.seconds);
    }

    /// Account one completed iteration that took `seconds`
    pub fn set_iteration_time(&mut self, seconds: f64) {
        self.stats.push(seconds);
    }

    pub fn iterations(&self) -> u64 {
        self.stats.count()
    }

    /// Bytes moved by the completed iterations
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_per_iteration.saturating_mul(self.stats.count())
    }

    pub fn finish(self) -> Measurement {
        Measurement::from_stats(&self.stats, self.bytes_per_iteration)
    }
}
