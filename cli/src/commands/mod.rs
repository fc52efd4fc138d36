//! Command implementations

pub mod list;
pub mod run;
pub mod topology;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use numacopy_bench::{BenchConfig, SizeRange};
use numacopy_shared::utils::{parse_duration, parse_id_list};

use crate::backend::BackendKind;

/// Back end selection shared by every command
#[derive(Args, Debug)]
pub struct BackendArgs {
    /// GPU back end
    #[arg(long, value_enum, env = "NUMACOPY_BACKEND", default_value_t = BackendKind::default())]
    pub backend: BackendKind,

    /// Number of devices exposed by the simulated back end
    #[arg(long, default_value = "1")]
    pub sim_devices: u32,
}

/// Case selection shared by `run` and `list`
#[derive(Args, Debug)]
pub struct SelectionArgs {
    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Size exponents as START:END:STEP, START:END or a single exponent
    #[arg(long)]
    pub sizes: Option<SizeRange>,

    /// GPUs to measure (e.g., "0,2" or "0-3")
    #[arg(long)]
    pub gpus: Option<String>,

    /// NUMA nodes to bind to (e.g., "0-1")
    #[arg(long)]
    pub numa: Option<String>,

    /// Only cases whose name contains this string
    #[arg(long)]
    pub filter: Option<String>,
}

impl SelectionArgs {
    /// Merge the configuration file (if any) with command-line overrides
    pub fn load_config(&self) -> Result<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };

        if let Some(sizes) = self.sizes {
            config.sizes = sizes;
        }
        if let Some(gpus) = &self.gpus {
            config.gpus = Some(parse_id_list(gpus).context("Failed to parse --gpus")?);
        }
        if let Some(numa) = &self.numa {
            config.numa_nodes = Some(parse_id_list(numa).context("Failed to parse --numa")?);
        }
        if self.filter.is_some() {
            config.filter = self.filter.clone();
        }

        Ok(config)
    }
}

/// Parse a `--min-time` value
pub fn parse_min_time(s: &str) -> Result<std::time::Duration> {
    parse_duration(s).context("Failed to parse duration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> SelectionArgs {
        SelectionArgs {
            config: None,
            sizes: None,
            gpus: None,
            numa: None,
            filter: None,
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = SelectionArgs {
            sizes: Some("20".parse().unwrap()),
            gpus: Some("0,2".to_string()),
            numa: Some("0-1".to_string()),
            ..selection()
        };
        let config = args.load_config().unwrap();
        assert_eq!(config.sizes.exponents(), vec![20]);
        assert_eq!(config.gpus, Some(vec![0, 2]));
        assert_eq!(config.numa_nodes, Some(vec![0, 1]));
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "filter = \"/0/\"\ngpus = [1]\n").unwrap();

        let args = SelectionArgs {
            config: Some(path),
            gpus: Some("3".to_string()),
            ..selection()
        };
        let config = args.load_config().unwrap();
        assert_eq!(config.filter.as_deref(), Some("/0/"));
        assert_eq!(config.gpus, Some(vec![3]));
    }

    #[test]
    fn test_bad_id_list() {
        let args = SelectionArgs {
            numa: Some("x".to_string()),
            ..selection()
        };
        assert!(args.load_config().is_err());
    }
}
