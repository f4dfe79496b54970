//! BatterySource — charge level, voltage, temperature, and charging state
//! from `/sys/class/power_supply`.
//!
//! Battery runs on its own sampling period (default 60s) like any other
//! poll source, so its readings stay fresh even when every other event
//! stream goes quiet.

use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::event::{CollectionEvent, EventPayload, RegisterParams};
use crate::record::{MetricGroup, MetricRecord, MetricValue};
use crate::source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};
use crate::sources::helpers::{read_i64, read_trimmed};

/// Default sampling period.
pub const DEFAULT_BATTERY_PERIOD_MS: u64 = 60_000;

static BATTERY_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::Battery,
    title: "Battery",
    description: "Charge level, voltage, temperature, charging state",
    kind: SourceKind::Poll,
    metrics: &[
        SubMetricInfo {
            name: "level",
            units: "%",
            max_range: 100.0,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "voltage",
            units: "mV",
            max_range: 10_000.0,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "temperature",
            units: "C",
            max_range: 100.0,
            resolution: 0.1,
        },
        SubMetricInfo {
            name: "status",
            units: "state",
            max_range: 3.0,
            resolution: 1.0,
        },
    ],
    power_ma: 0.1,
    min_period_ms: 1_000,
    inputs: &[],
};

/// Charging-state encoding for the `status` sub-metric.
const STATUS_UNKNOWN: i8 = -1;
const STATUS_DISCHARGING: i8 = 0;
const STATUS_CHARGING: i8 = 1;
const STATUS_FULL: i8 = 2;

pub struct BatterySource {
    timing: SourceTiming,
    base: PathBuf,
    /// Resolved battery directory, found by the init probe.
    battery_dir: Option<PathBuf>,
}

impl BatterySource {
    pub fn new() -> Self {
        Self::with_base(PathBuf::from("/sys/class/power_supply"))
    }

    /// Probe an alternate sysfs tree (tests).
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            timing: SourceTiming::new(DEFAULT_BATTERY_PERIOD_MS),
            base,
            battery_dir: None,
        }
    }

    fn find_battery(base: &Path) -> Option<PathBuf> {
        let entries = std::fs::read_dir(base).ok()?;
        for entry in entries.flatten() {
            let dir = entry.path();
            if read_trimmed(&dir.join("type")).as_deref() == Some("Battery") {
                return Some(dir);
            }
        }
        None
    }

    fn sample(&self, now_ms: u64) -> Vec<MetricRecord> {
        let Some(dir) = &self.battery_dir else {
            return Vec::new();
        };
        let group = MetricGroup::Battery;
        let mut records = Vec::with_capacity(4);

        if let Some(level) = read_i64(&dir.join("capacity")) {
            records.push(MetricRecord::new(
                group.metric_id(0),
                now_ms,
                MetricValue::I8(level.clamp(0, 100) as i8),
            ));
        }
        // voltage_now is in microvolts.
        if let Some(uv) = read_i64(&dir.join("voltage_now")) {
            records.push(MetricRecord::new(
                group.metric_id(1),
                now_ms,
                MetricValue::I32((uv / 1000) as i32),
            ));
        }
        // temp is in tenths of a degree Celsius.
        if let Some(tenths) = read_i64(&dir.join("temp")) {
            records.push(MetricRecord::new(
                group.metric_id(2),
                now_ms,
                MetricValue::F32(tenths as f32 / 10.0),
            ));
        }
        let status = match read_trimmed(&dir.join("status")).as_deref() {
            Some("Charging") => STATUS_CHARGING,
            Some("Discharging") | Some("Not charging") => STATUS_DISCHARGING,
            Some("Full") => STATUS_FULL,
            _ => STATUS_UNKNOWN,
        };
        records.push(MetricRecord::new(
            group.metric_id(3),
            now_ms,
            MetricValue::I8(status),
        ));
        records
    }
}

impl Default for BatterySource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for BatterySource {
    fn info(&self) -> &'static SourceInfo {
        &BATTERY_INFO
    }

    fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    fn init(&mut self, period_ms: u64) -> bool {
        self.timing = SourceTiming::new(period_ms.max(BATTERY_INFO.min_period_ms));
        self.battery_dir = Self::find_battery(&self.base);
        self.timing.supported = self.battery_dir.is_some();
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
        self.sample(event.uptime_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_battery(dir: &Path) {
        let bat = dir.join("BAT0");
        std::fs::create_dir_all(&bat).unwrap();
        std::fs::write(bat.join("type"), "Battery\n").unwrap();
        std::fs::write(bat.join("capacity"), "87\n").unwrap();
        std::fs::write(bat.join("voltage_now"), "12123000\n").unwrap();
        std::fs::write(bat.join("temp"), "305\n").unwrap();
        std::fs::write(bat.join("status"), "Charging\n").unwrap();
    }

    #[test]
    fn probe_fails_without_a_battery() {
        let dir = tempfile::tempdir().unwrap();
        let mut src = BatterySource::with_base(dir.path().to_path_buf());
        assert!(!src.init(60_000));
        assert!(!src.timing().supported);
    }

    #[test]
    fn samples_all_four_submetrics() {
        let dir = tempfile::tempdir().unwrap();
        fake_battery(dir.path());
        let mut src = BatterySource::with_base(dir.path().to_path_buf());
        assert!(src.init(60_000));
        let records = src.produce(&CollectionEvent::poll_tick(1_000));
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].value, MetricValue::I8(87));
        assert_eq!(records[1].value, MetricValue::I32(12_123));
        assert_eq!(records[2].value, MetricValue::F32(30.5));
        assert_eq!(records[3].value, MetricValue::I8(STATUS_CHARGING));
    }

    #[test]
    fn throttles_between_periods() {
        let dir = tempfile::tempdir().unwrap();
        fake_battery(dir.path());
        let mut src = BatterySource::with_base(dir.path().to_path_buf());
        src.init(60_000);
        assert!(!src.produce(&CollectionEvent::poll_tick(0)).is_empty());
        assert!(src.produce(&CollectionEvent::poll_tick(10_000)).is_empty());
        assert!(!src.produce(&CollectionEvent::poll_tick(60_000)).is_empty());
    }

    #[test]
    fn ignores_non_poll_events() {
        let dir = tempfile::tempdir().unwrap();
        fake_battery(dir.path());
        let mut src = BatterySource::with_base(dir.path().to_path_buf());
        src.init(60_000);
        let event = CollectionEvent::new(
            0,
            EventPayload::Broadcast(crate::event::BroadcastSignal::ScreenOn),
        );
        assert!(src.produce(&event).is_empty());
    }
}
