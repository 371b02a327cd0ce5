//! Timestamp utilities

use anyhow::{Result, bail};
use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::utils::config::TIMESTAMP_FORMAT;

/// Current local time in side-table format.
pub fn now_stamp() -> String {
    format_stamp(&Local::now().naive_local())
}

pub fn format_stamp(t: &NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a user-supplied cutoff. Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` and the `T` forms.
/// A bare date means midnight at the start of that day.
pub fn parse_cutoff(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for fmt in [
        TIMESTAMP_FORMAT,
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        && let Some(t) = d.and_hms_opt(0, 0, 0)
    {
        return Ok(t);
    }
    bail!(
        "invalid cutoff {:?}; expected YYYY-MM-DD or YYYY-MM-DD HH:MM[:SS]",
        s
    )
}
