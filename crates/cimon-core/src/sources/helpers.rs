//! Shared helpers used by multiple source implementations.
//!
//! Keeps the vector-magnitude rule and the pseudo-file parsing primitives
//! in one place instead of duplicated across sources.

use std::path::Path;

/// Euclidean norm of a vector reading.
///
/// Sources that sample vector quantities (accelerometer, gyroscope,
/// magnetometer, linear acceleration) append this as their final
/// sub-metric.
pub fn magnitude(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Read a pseudo-file and trim it; `None` when missing or empty.
pub fn read_trimmed(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let v = raw.trim();
    if v.is_empty() { None } else { Some(v.to_string()) }
}

/// Read the first whitespace-separated field of a pseudo-file as f64.
pub fn read_first_f64(path: &Path) -> Option<f64> {
    read_trimmed(path)?.split_whitespace().next()?.parse().ok()
}

/// Read a pseudo-file holding one integer.
pub fn read_i64(path: &Path) -> Option<i64> {
    read_trimmed(path)?.parse().ok()
}

/// First numeric field following `label` in `/proc/meminfo`-style text
/// (`"MemTotal:   16316412 kB"` → `16316412`).
pub fn labeled_field(text: &str, label: &str) -> Option<i64> {
    text.lines()
        .find(|line| line.starts_with(label))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}
