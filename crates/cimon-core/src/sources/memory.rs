//! MemInfoSource — memory usage from `/proc/meminfo`.

use std::path::PathBuf;

use crate::error::PipelineError;
use crate::event::{CollectionEvent, EventPayload, RegisterParams};
use crate::record::{MetricGroup, MetricRecord, MetricValue};
use crate::source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};
use crate::sources::helpers::{labeled_field, read_trimmed};

static MEMORY_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::Memory,
    title: "Memory",
    description: "Total/free/available/cached memory",
    kind: SourceKind::Poll,
    metrics: &[
        SubMetricInfo {
            name: "total",
            units: "kB",
            max_range: 1e12,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "free",
            units: "kB",
            max_range: 1e12,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "available",
            units: "kB",
            max_range: 1e12,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "cached",
            units: "kB",
            max_range: 1e12,
            resolution: 1.0,
        },
    ],
    power_ma: 0.1,
    min_period_ms: 500,
    inputs: &[],
};

/// Labels read from meminfo, in sub-metric order.
const LABELS: [&str; 4] = ["MemTotal:", "MemFree:", "MemAvailable:", "Cached:"];

pub struct MemInfoSource {
    timing: SourceTiming,
    path: PathBuf,
}

impl MemInfoSource {
    pub fn new() -> Self {
        Self::with_path(PathBuf::from("/proc/meminfo"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            timing: SourceTiming::new(30_000),
            path,
        }
    }
}

impl Default for MemInfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for MemInfoSource {
    fn info(&self) -> &'static SourceInfo {
        &MEMORY_INFO
    }

    fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    fn init(&mut self, period_ms: u64) -> bool {
        self.timing = SourceTiming::new(period_ms.max(MEMORY_INFO.min_period_ms));
        self.timing.supported = read_trimmed(&self.path).is_some();
        self.timing.supported
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
        let Some(text) = read_trimmed(&self.path) else {
            log::warn!("meminfo read failed; no data this cycle");
            return Vec::new();
        };
        let group = MetricGroup::Memory;
        LABELS
            .iter()
            .enumerate()
            .filter_map(|(i, label)| {
                labeled_field(&text, label).map(|kb| {
                    MetricRecord::new(
                        group.metric_id(i as u32),
                        event.uptime_ms,
                        MetricValue::I64(kb),
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16316412 kB\n\
                           MemFree:          271908 kB\n\
                           MemAvailable:    9560776 kB\n\
                           Buffers:          572796 kB\n\
                           Cached:          8587524 kB\n";

    #[test]
    fn emits_four_submetrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meminfo");
        std::fs::write(&path, MEMINFO).unwrap();
        let mut src = MemInfoSource::with_path(path);
        assert!(src.init(1000));
        let records = src.produce(&CollectionEvent::poll_tick(0));
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].value, MetricValue::I64(16_316_412));
        assert_eq!(records[2].value, MetricValue::I64(9_560_776));
        assert_eq!(records[3].value, MetricValue::I64(8_587_524));
    }

    #[test]
    fn partial_meminfo_emits_what_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meminfo");
        std::fs::write(&path, "MemTotal: 1000 kB\n").unwrap();
        let mut src = MemInfoSource::with_path(path);
        src.init(1000);
        let records = src.produce(&CollectionEvent::poll_tick(0));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn missing_file_means_unsupported() {
        let mut src = MemInfoSource::with_path(PathBuf::from("/nonexistent/meminfo"));
        assert!(!src.init(1000));
    }
}
