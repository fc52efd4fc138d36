//! Configuration types for benchmark runs
//!
//! Values come from, in increasing precedence: built-in defaults,
//! `NUMACOPY_*` environment variables, an optional TOML file, and finally
//! command-line flags applied by the caller.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use numacopy_shared::utils::parse_duration;
use numacopy_shared::{GpuId, NumaNodeId, MAX_SIZE_EXPONENT};
use serde::{Deserialize, Serialize};

use crate::harness::{IterationPolicy, DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_TIME};

/// Inclusive range of transfer size exponents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl SizeRange {
    /// Exponents from `start` to `end` inclusive, `step` apart
    pub fn exponents(&self) -> Vec<u32> {
        if self.step == 0 {
            return Vec::new();
        }
        (self.start..=self.end).step_by(self.step as usize).collect()
    }
}

impl Default for SizeRange {
    fn default() -> Self {
        Self {
            start: 8,
            end: 31,
            step: 2,
        }
    }
}

impl FromStr for SizeRange {
    type Err = anyhow::Error;

    /// Accepts `EXP`, `START:END` or `START:END:STEP`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(':')
            .map(|p| {
                p.trim()
                    .parse::<u32>()
                    .with_context(|| format!("Invalid size range: {}", s))
            })
            .collect::<Result<Vec<_>>>()?;

        match parts[..] {
            [exp] => Ok(Self {
                start: exp,
                end: exp,
                step: 1,
            }),
            [start, end] => Ok(Self {
                start,
                end,
                step: 1,
            }),
            [start, end, step] => Ok(Self { start, end, step }),
            _ => bail!("Invalid size range: {}", s),
        }
    }
}

/// Benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Transfer size exponents to sweep
    pub sizes: SizeRange,

    /// Minimum measured time per case (ignored with fixed iterations)
    #[serde(with = "duration_str")]
    pub min_time: Duration,

    /// Run exactly this many iterations per case
    pub iterations: Option<u64>,

    /// Iteration cap for time-based runs
    pub max_iterations: u64,

    /// Only measure these GPUs (None = all)
    pub gpus: Option<Vec<GpuId>>,

    /// Only bind to these NUMA nodes (None = all)
    pub numa_nodes: Option<Vec<NumaNodeId>>,

    /// Only run cases whose name contains this string
    pub filter: Option<String>,

    /// Optional JSON report path
    pub json_output: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            sizes: SizeRange::default(),
            min_time: std::env::var("NUMACOPY_MIN_TIME")
                .ok()
                .and_then(|s| parse_duration(&s).ok())
                .unwrap_or(DEFAULT_MIN_TIME),
            iterations: None,
            max_iterations: std::env::var("NUMACOPY_MAX_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_ITERATIONS),
            gpus: None,
            numa_nodes: None,
            filter: None,
            json_output: None,
        }
    }
}

impl BenchConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse configuration")
    }

    /// Load a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Iteration policy every case runs with
    pub fn iteration_policy(&self) -> IterationPolicy {
        match self.iterations {
            Some(n) => IterationPolicy::Fixed(n),
            None => IterationPolicy::MinTime {
                min_time: self.min_time,
                max_iterations: self.max_iterations,
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let SizeRange { start, end, step } = self.sizes;
        if step == 0 {
            bail!("Size step must be greater than 0");
        }
        if start > end {
            bail!("Size range start ({}) is after its end ({})", start, end);
        }
        if end > MAX_SIZE_EXPONENT {
            bail!(
                "Size exponent {} too large (max {})",
                end,
                MAX_SIZE_EXPONENT
            );
        }

        match self.iterations {
            Some(0) => bail!("Iteration count must be greater than 0"),
            Some(_) => {}
            None => {
                if self.min_time.is_zero() {
                    bail!("Minimum time must be greater than 0");
                }
                if self.max_iterations == 0 {
                    bail!("Maximum iteration count must be greater than 0");
                }
            }
        }

        Ok(())
    }
}

/// Durations as human-readable strings ("500ms", "2s")
mod duration_str {
    use numacopy_shared::utils::parse_duration;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{}s", d.as_secs_f64()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
