//! Table formatting helpers for CLI output.

use comfy_table::{ContentArrangement, Table};

/// Borderless table with dynamic column widths, as used by `strata ls`.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().copied());
    table
}

/// Format an optional value, using "-" when absent.
pub fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Largest unit first; months and years are approximate.
const AGE_UNITS: [(&str, i64); 6] = [
    ("year", 365 * 86_400),
    ("month", 30 * 86_400),
    ("day", 86_400),
    ("hour", 3_600),
    ("minute", 60),
    ("second", 1),
];

/// Age of a layer as "<n> <unit>(s) ago", using the largest whole unit.
pub fn format_ago(created: &chrono::DateTime<chrono::Utc>) -> String {
    let secs = chrono::Utc::now().signed_duration_since(*created).num_seconds();
    if secs <= 0 {
        return "just now".to_string();
    }

    let (unit, count) = AGE_UNITS
        .iter()
        .find(|(_, size)| secs >= *size)
        .map(|(unit, size)| (*unit, secs / size))
        .unwrap_or(("second", secs));
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{plural} ago")
}
