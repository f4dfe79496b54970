//! Clock access: monotonic uptime for in-pipeline timestamps, wall clock
//! only for the per-monitor offset.

use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic uptime in milliseconds.
///
/// Robust against wall-clock adjustments; every timestamp inside the
/// pipeline is one of these.
#[cfg(unix)]
pub fn uptime_ms() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: clock_gettime only writes the timespec we hand it and has no
    // other side effects.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc == 0 {
        ts.tv_sec as u64 * 1000 + ts.tv_nsec as u64 / 1_000_000
    } else {
        fallback_uptime_ms()
    }
}

#[cfg(not(unix))]
pub fn uptime_ms() -> u64 {
    fallback_uptime_ms()
}

/// Process-local monotonic fallback when the OS clock is unavailable.
fn fallback_uptime_ms() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as u64
}

/// Wall clock in milliseconds since the Unix epoch.
pub fn wall_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
