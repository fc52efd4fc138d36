//! Result reporters

pub mod console;
pub mod json;

pub use console::ConsoleReporter;
pub use json::{generate_json, BenchmarkEntry, JsonReport, ReportContext};
