//! CpuLoadSource — load average and jiffy shares from `/proc`.
//!
//! Utilization percentages are deltas between consecutive polls of
//! `/proc/stat`; the first poll of a session only establishes the baseline
//! and emits the load average alone.

use std::path::PathBuf;

use crate::error::PipelineError;
use crate::event::{CollectionEvent, EventPayload, RegisterParams};
use crate::record::{MetricGroup, MetricRecord, MetricValue};
use crate::source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};
use crate::sources::helpers::read_trimmed;

static CPU_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::CpuLoad,
    title: "CPU load",
    description: "1-minute load average and user/system/idle shares",
    kind: SourceKind::Poll,
    metrics: &[
        SubMetricInfo {
            name: "load_1m",
            units: "procs",
            max_range: 1024.0,
            resolution: 0.01,
        },
        SubMetricInfo {
            name: "user",
            units: "%",
            max_range: 100.0,
            resolution: 0.1,
        },
        SubMetricInfo {
            name: "system",
            units: "%",
            max_range: 100.0,
            resolution: 0.1,
        },
        SubMetricInfo {
            name: "idle",
            units: "%",
            max_range: 100.0,
            resolution: 0.1,
        },
    ],
    power_ma: 0.1,
    min_period_ms: 500,
    inputs: &[],
};

/// Jiffy counters from the aggregate `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    user: u64,
    system: u64,
    idle: u64,
    total: u64,
}

/// Parse the aggregate `cpu` line. `user` includes nice time.
fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    let user = fields[0] + fields[1];
    let system = fields[2];
    let idle = fields[3];
    let total: u64 = fields.iter().sum();
    Some(CpuTimes {
        user,
        system,
        idle,
        total,
    })
}

/// 1-minute load average from `/proc/loadavg` text.
fn parse_load_1m(loadavg: &str) -> Option<f64> {
    loadavg.split_whitespace().next()?.parse().ok()
}

/// Percentage shares between two jiffy snapshots.
fn shares(prev: CpuTimes, cur: CpuTimes) -> Option<(f32, f32, f32)> {
    let total = cur.total.checked_sub(prev.total)?;
    if total == 0 {
        return None;
    }
    let pct = |delta: u64| delta as f32 * 100.0 / total as f32;
    Some((
        pct(cur.user.saturating_sub(prev.user)),
        pct(cur.system.saturating_sub(prev.system)),
        pct(cur.idle.saturating_sub(prev.idle)),
    ))
}

pub struct CpuLoadSource {
    timing: SourceTiming,
    stat_path: PathBuf,
    loadavg_path: PathBuf,
    prev: Option<CpuTimes>,
}

impl CpuLoadSource {
    pub fn new() -> Self {
        Self::with_paths(PathBuf::from("/proc/stat"), PathBuf::from("/proc/loadavg"))
    }

    pub fn with_paths(stat_path: PathBuf, loadavg_path: PathBuf) -> Self {
        Self {
            timing: SourceTiming::new(30_000),
            stat_path,
            loadavg_path,
            prev: None,
        }
    }
}

impl Default for CpuLoadSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for CpuLoadSource {
    fn info(&self) -> &'static SourceInfo {
        &CPU_INFO
    }

    fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    fn init(&mut self, period_ms: u64) -> bool {
        self.timing = SourceTiming::new(period_ms.max(CPU_INFO.min_period_ms));
        self.prev = None;
        let supported = read_trimmed(&self.stat_path).is_some();
        self.timing.supported = supported;
        supported
    }

    fn register(&mut self, _params: &RegisterParams) -> Result<(), PipelineError> {
        self.timing.registered = true;
        Ok(())
    }

    fn unregister(&mut self) {
        self.timing.registered = false;
    }

    fn produce(&mut self, event: &CollectionEvent) -> Vec<MetricRecord> {
        if !matches!(event.payload, EventPayload::PollTick) {
            return Vec::new();
        }
        if !self.timing.accept(event.uptime_ms) {
            return Vec::new();
        }
        let now = event.uptime_ms;
        let group = MetricGroup::CpuLoad;
        let mut records = Vec::with_capacity(4);

        if let Some(load) = read_trimmed(&self.loadavg_path).and_then(|t| parse_load_1m(&t)) {
            records.push(MetricRecord::new(
                group.metric_id(0),
                now,
                MetricValue::F32(load as f32),
            ));
        }

        let Some(cur) = read_trimmed(&self.stat_path).and_then(|t| parse_cpu_times(&t)) else {
            log::warn!("cpu stat read failed; no data this cycle");
            return records;
        };
        if let Some((user, system, idle)) = self.prev.and_then(|p| shares(p, cur)) {
            records.push(MetricRecord::new(
                group.metric_id(1),
                now,
                MetricValue::F32(user),
            ));
            records.push(MetricRecord::new(
                group.metric_id(2),
                now,
                MetricValue::F32(system),
            ));
            records.push(MetricRecord::new(
                group.metric_id(3),
                now,
                MetricValue::F32(idle),
            ));
        }
        self.prev = Some(cur);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const STAT_A: &str = "cpu  100 10 50 800 5 0 2 0 0 0\ncpu0 50 5 25 400 2 0 1 0 0 0\n";
    const STAT_B: &str = "cpu  160 20 80 900 5 0 2 0 0 0\ncpu0 80 10 40 450 2 0 1 0 0 0\n";

    #[test]
    fn parses_aggregate_cpu_line() {
        let times = parse_cpu_times(STAT_A).unwrap();
        assert_eq!(times.user, 110);
        assert_eq!(times.system, 50);
        assert_eq!(times.idle, 800);
        assert_eq!(times.total, 967);
    }

    #[test]
    fn parses_load_average() {
        assert_eq!(parse_load_1m("0.52 0.58 0.59 1/467 12345\n"), Some(0.52));
        assert_eq!(parse_load_1m(""), None);
    }

    #[test]
    fn shares_between_snapshots() {
        let prev = parse_cpu_times(STAT_A).unwrap();
        let cur = parse_cpu_times(STAT_B).unwrap();
        // deltas: user+nice = 70, system = 30, idle = 100, total = 200
        let (user, system, idle) = shares(prev, cur).unwrap();
        assert!((user - 35.0).abs() < 1e-4);
        assert!((system - 15.0).abs() < 1e-4);
        assert!((idle - 50.0).abs() < 1e-4);
    }

    #[test]
    fn shares_need_forward_progress() {
        let times = parse_cpu_times(STAT_A).unwrap();
        assert_eq!(shares(times, times), None);
    }

    fn write_proc(dir: &Path, stat: &str, loadavg: &str) -> (PathBuf, PathBuf) {
        let stat_path = dir.join("stat");
        let loadavg_path = dir.join("loadavg");
        std::fs::write(&stat_path, stat).unwrap();
        std::fs::write(&loadavg_path, loadavg).unwrap();
        (stat_path, loadavg_path)
    }

    #[test]
    fn first_poll_emits_load_only_then_full_set() {
        let dir = tempfile::tempdir().unwrap();
        let (stat, loadavg) = write_proc(dir.path(), STAT_A, "0.50 0.40 0.30 1/100 1\n");
        let mut src = CpuLoadSource::with_paths(stat.clone(), loadavg);
        assert!(src.init(1000));

        let first = src.produce(&CollectionEvent::poll_tick(0));
        assert_eq!(first.len(), 1); // baseline poll: load average only

        std::fs::write(&stat, STAT_B).unwrap();
        let second = src.produce(&CollectionEvent::poll_tick(1000));
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn missing_stat_file_means_unsupported() {
        let mut src = CpuLoadSource::with_paths(
            PathBuf::from("/nonexistent/stat"),
            PathBuf::from("/nonexistent/loadavg"),
        );
        assert!(!src.init(1000));
    }
}
