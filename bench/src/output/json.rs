//! JSON output
//!
//! Exports case results in a benchmark-report layout for further analysis

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use numacopy_shared::utils::time::local_timestamp;
use numacopy_shared::{CaseOutcome, CaseResult, CaseStage};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Host the report was produced on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportContext {
    pub date: String,
    pub host_name: String,
    pub num_cpus: usize,
    pub backend: String,
}

impl ReportContext {
    /// Describe the current host and GPU back end
    pub fn current(backend: &str) -> Self {
        Self {
            date: local_timestamp(),
            host_name: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            num_cpus: num_cpus::get(),
            backend: backend.to_string(),
        }
    }
}

/// One report entry per case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    pub name: String,
    pub run_name: String,
    pub iterations: u64,

    /// Mean time per iteration, in `time_unit`
    pub real_time: f64,
    pub real_time_stddev: f64,
    pub time_unit: String,

    pub bytes_per_second: f64,

    pub bytes: u64,
    pub cuda_id: u32,
    pub numa_id: u32,

    pub error_occurred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Stage the case ended in
    pub stage: CaseStage,
}

impl From<&CaseResult> for BenchmarkEntry {
    fn from(result: &CaseResult) -> Self {
        let (iterations, real_time, real_time_stddev, bytes_per_second) = match &result.outcome {
            CaseOutcome::Completed(m) => (
                m.iterations,
                m.mean_time_secs * 1e6,
                m.stddev_time_secs * 1e6,
                m.bytes_per_second(),
            ),
            CaseOutcome::Failed {
                iterations_completed,
                ..
            } => (*iterations_completed, 0.0, 0.0, 0.0),
            CaseOutcome::Skipped { .. } => (0, 0.0, 0.0, 0.0),
        };

        Self {
            name: result.name.clone(),
            run_name: result.run_name.clone(),
            iterations,
            real_time,
            real_time_stddev,
            time_unit: "us".to_string(),
            bytes_per_second,
            bytes: result.counters.bytes,
            cuda_id: result.counters.cuda_id,
            numa_id: result.counters.numa_id,
            error_occurred: !result.is_success(),
            error_message: result.error_message().map(str::to_string),
            stage: result.outcome.stage(),
        }
    }
}

/// Complete JSON report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    pub context: ReportContext,
    pub benchmarks: Vec<BenchmarkEntry>,
}

impl JsonReport {
    pub fn new(context: ReportContext, results: &[CaseResult]) -> Self {
        Self {
            context,
            benchmarks: results.iter().map(BenchmarkEntry::from).collect(),
        }
    }
}

/// Write a JSON report of `results` to `output_path`
pub fn generate_json(report: &JsonReport, output_path: &Path) -> Result<()> {
    info!("Generating JSON output: {}", output_path.display());

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, report).context("Failed to serialize report to JSON")?;

    info!("JSON output written to {}", output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use numacopy_shared::{Measurement, MeasurementCase};

    fn results() -> Vec<CaseResult> {
        vec![
            CaseResult::new(
                MeasurementCase::new(1, 0, 20).unwrap(),
                CaseOutcome::Completed(Measurement {
                    iterations: 4,
                    total_time_secs: 0.004,
                    mean_time_secs: 0.001,
                    stddev_time_secs: 0.0,
                    min_time_secs: 0.001,
                    max_time_secs: 0.001,
                    bytes_processed: 4 << 20,
                }),
            ),
            CaseResult::new(
                MeasurementCase::new(1, 0, 22).unwrap(),
                CaseOutcome::Failed {
                    stage: CaseStage::Measuring,
                    reason: "Comm_NUMAMemcpy_GPUToWC failed to perform memcpy".to_string(),
                    iterations_completed: 2,
                },
            ),
        ]
    }

    #[test]
    fn test_entry_from_result() {
        let results = results();
        let ok = BenchmarkEntry::from(&results[0]);
        assert_eq!(ok.name, "Comm_NUMAMemcpy_GPUToWC/1/0");
        assert_eq!(ok.bytes, 1 << 20);
        assert!((ok.real_time - 1000.0).abs() < 1e-9);
        assert!(!ok.error_occurred);
        assert_eq!(ok.stage, CaseStage::Completed);

        let failed = BenchmarkEntry::from(&results[1]);
        assert!(failed.error_occurred);
        assert_eq!(failed.iterations, 2);
        assert_eq!(failed.bytes_per_second, 0.0);
        assert_eq!(failed.stage, CaseStage::Measuring);
    }

    #[test]
    fn test_generate_json() {
        let report = JsonReport::new(ReportContext::current("sim"), &results());

        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("report.json");

        generate_json(&report, &output_path).unwrap();

        let contents = std::fs::read_to_string(&output_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["context"]["backend"], "sim");
        assert_eq!(parsed["benchmarks"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["benchmarks"][0]["numa_id"], 1);
        assert_eq!(parsed["benchmarks"][1]["stage"], "MEASURING");
        assert!(parsed["benchmarks"][0].get("error_message").is_none());
    }

    #[test]
    fn test_generate_json_bad_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let report = JsonReport::new(ReportContext::current("sim"), &[]);
        assert!(generate_json(&report, &temp_dir.path().join("missing/report.json")).is_err());
    }
}
