//! Collection-session identity (monitors) and the paired clock sample used
//! for wall-clock correction.
//!
//! A monitor groups every record of one start-to-stop collection run. The
//! wall−uptime offset captured at creation translates stored uptime
//! timestamps back to wall clock at read time; nothing inside the pipeline
//! ever consumes wall clock directly.

use crate::error::PipelineError;
use crate::time;

/// Identifier of one collection session, assigned by the monitor store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(pub i64);

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One paired sample of the wall clock and the uptime clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    /// Wall clock, milliseconds since the Unix epoch.
    pub wall_ms: i64,
    /// Monotonic uptime, milliseconds.
    pub uptime_ms: u64,
}

impl TimeBase {
    /// Sample both clocks now.
    pub fn now() -> Self {
        Self {
            wall_ms: time::wall_ms(),
            uptime_ms: time::uptime_ms(),
        }
    }

    /// Offset stored per monitor: `wall = uptime + offset`.
    pub fn offset_ms(&self) -> i64 {
        self.wall_ms - self.uptime_ms as i64
    }
}

/// Persistent registry of monitors.
///
/// `resolve_monitor` reuses the monitor already marked running (a process
/// restart mid-session resumes it) or creates a new one capturing the
/// wall−uptime offset. `end_monitor` clears the running marker without
/// deleting historical data.
pub trait MonitorStore: Send + Sync {
    fn resolve_monitor(&self, time: &TimeBase) -> Result<MonitorId, PipelineError>;
    fn end_monitor(&self, monitor: MonitorId, end_uptime_ms: u64) -> Result<(), PipelineError>;
}
