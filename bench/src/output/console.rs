//! Console reporter
//!
//! Prints one table row per case as results arrive, then a short summary.

use std::io::Write;

use anyhow::Result;
use numacopy_shared::utils::{format_bytes, format_rate, format_seconds};
use numacopy_shared::{CaseOutcome, CaseResult};

const NAME_WIDTH: usize = 44;
const RULE_WIDTH: usize = 128;

/// Fixed-width table writer
pub struct ConsoleReporter<W: Write> {
    writer: W,
    header_written: bool,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    fn header(&mut self) -> Result<()> {
        writeln!(
            self.writer,
            "{:<NAME_WIDTH$} {:>12} {:>13} {:>13} {:>15} {:>10} {:>7} {:>7}",
            "Benchmark", "Iterations", "Time/iter", "StdDev", "Throughput", "bytes", "cuda_id", "numa_id"
        )?;
        writeln!(self.writer, "{:-<RULE_WIDTH$}", "")?;
        self.header_written = true;
        Ok(())
    }

    /// Write the row of one result
    pub fn report(&mut self, result: &CaseResult) -> Result<()> {
        if !self.header_written {
            self.header()?;
        }

        match &result.outcome {
            CaseOutcome::Completed(m) => writeln!(
                self.writer,
                "{:<NAME_WIDTH$} {:>12} {:>13} {:>13} {:>15} {:>10} {:>7} {:>7}",
                result.run_name,
                m.iterations,
                format_seconds(m.mean_time_secs),
                format_seconds(m.stddev_time_secs),
                format_rate(m.bytes_per_second()),
                format_bytes(result.counters.bytes),
                result.counters.cuda_id,
                result.counters.numa_id,
            )?,
            CaseOutcome::Failed { reason, .. } => writeln!(
                self.writer,
                "{:<NAME_WIDTH$} ERROR OCCURRED: '{}'",
                result.run_name, reason
            )?,
            CaseOutcome::Skipped { reason, .. } => writeln!(
                self.writer,
                "{:<NAME_WIDTH$} SKIPPED: '{}'",
                result.run_name, reason
            )?,
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Write the closing summary line
    pub fn summary(&mut self, results: &[CaseResult]) -> Result<()> {
        if !self.header_written {
            self.header()?;
        }

        let completed = results.iter().filter(|r| r.is_success()).count();
        let failed = results
            .iter()
            .filter(|r| matches!(r.outcome, CaseOutcome::Failed { .. }))
            .count();
        let skipped = results.len() - completed - failed;

        writeln!(self.writer, "{:-<RULE_WIDTH$}", "")?;
        writeln!(
            self.writer,
            "{} case(s): {} completed, {} failed, {} skipped",
            results.len(),
            completed,
            failed,
            skipped
        )?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numacopy_shared::{CaseStage, Measurement, MeasurementCase};

    fn completed() -> CaseResult {
        CaseResult::new(
            MeasurementCase::new(1, 0, 20).unwrap(),
            CaseOutcome::Completed(Measurement {
                iterations: 10,
                total_time_secs: 0.001,
                mean_time_secs: 0.0001,
                stddev_time_secs: 0.0,
                min_time_secs: 0.0001,
                max_time_secs: 0.0001,
                bytes_processed: 10 << 20,
            }),
        )
    }

    #[test]
    fn test_table_rows() {
        let skipped = CaseResult::new(
            MeasurementCase::new(0, 0, 8).unwrap(),
            CaseOutcome::Skipped {
                stage: CaseStage::Created,
                reason: "Comm_NUMAMemcpy_GPUToWC NUMA not available".to_string(),
            },
        );

        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.report(&completed()).unwrap();
        reporter.report(&skipped).unwrap();
        reporter.summary(&[completed(), skipped]).unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("Benchmark"));
        assert!(lines[2].starts_with("Comm_NUMAMemcpy_GPUToWC/1/0/log2(N):20"));
        assert!(lines[2].contains("1.00 MiB"));
        assert!(lines[3].contains("SKIPPED: 'Comm_NUMAMemcpy_GPUToWC NUMA not available'"));
        assert_eq!(
            lines.last().copied(),
            Some("2 case(s): 1 completed, 0 failed, 1 skipped")
        );
    }

    #[test]
    fn test_header_written_once() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.report(&completed()).unwrap();
        reporter.report(&completed()).unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(text.matches("Benchmark").count(), 1);
    }
}
