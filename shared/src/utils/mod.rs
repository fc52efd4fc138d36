//! Utility functions and helpers

pub mod time;

use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Parse a duration string (e.g., "500ms", "2s", "1m")
///
/// Values without a suffix are taken as seconds and may be fractional.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    let (num_str, scale) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1e-3)
    } else if let Some(n) = s.strip_suffix("us") {
        (n, 1e-6)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60.0)
    } else {
        (s, 1.0)
    };

    let value: f64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration: {}", s))?;
    if !value.is_finite() || value < 0.0 {
        bail!("Invalid duration: {}", s);
    }
    Duration::try_from_secs_f64(value * scale)
        .with_context(|| format!("Duration out of range: {}", s))
}

/// Parse a list of ids in Linux cpulist syntax (e.g., "0-3,8,10-11")
///
/// The result is sorted and free of duplicates. An empty string yields an
/// empty list.
pub fn parse_id_list(s: &str) -> Result<Vec<u32>> {
    let mut ids = Vec::new();

    for part in s.trim().split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = lo
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid id range: {}", part))?;
                let hi: u32 = hi
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid id range: {}", part))?;
                if lo > hi {
                    bail!("Inverted id range: {}", part);
                }
                ids.extend(lo..=hi);
            }
            None => ids.push(
                part.parse()
                    .with_context(|| format!("Invalid id: {}", part))?,
            ),
        }
    }

    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Format a byte count with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Format a throughput with binary units per second
pub fn format_rate(bytes_per_second: f64) -> String {
    const UNITS: [&str; 5] = ["B/s", "KiB/s", "MiB/s", "GiB/s", "TiB/s"];

    let mut value = bytes_per_second;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.3} {}", value, UNITS[unit])
}

/// Format a duration given in seconds with an adaptive unit
pub fn format_seconds(secs: f64) -> String {
    if secs >= 1.0 {
        format!("{:.3} s", secs)
    } else if secs >= 1e-3 {
        format!("{:.3} ms", secs * 1e3)
    } else if secs >= 1e-6 {
        format!("{:.3} us", secs * 1e6)
    } else {
        format!("{:.0} ns", secs * 1e9)
    }
}
