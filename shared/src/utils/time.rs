//! Time-related utilities

use chrono::{Local, SecondsFormat};

/// Current local time as an RFC 3339 timestamp (second precision)
pub fn local_timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}
