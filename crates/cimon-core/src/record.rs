//! Metric groups, typed values, and the record unit that flows through the
//! pipeline.
//!
//! Every data source belongs to exactly one [`MetricGroup`]. A group owns a
//! contiguous block of metric ids: sub-metric `k` of a group has
//! `metric_id = base_id + k`. Records carry uptime timestamps only — wall
//! clock enters the picture at write/upload time via the monitor offset.

use serde::{Deserialize, Serialize};

/// Width of the metric-id block owned by each group.
pub const GROUP_BLOCK_WIDTH: u32 = 16;

/// Identifies one metric group (one data source).
///
/// The discriminant is the base metric id of the group's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MetricGroup {
    /// Battery level, voltage, temperature, plugged state.
    Battery = 0x00,
    /// CPU load average and jiffy shares.
    CpuLoad = 0x10,
    /// Memory usage from /proc/meminfo.
    Memory = 0x20,
    /// Network traffic counters.
    NetTraffic = 0x30,
    /// Three-axis accelerometer plus magnitude.
    Accelerometer = 0x40,
    /// Three-axis gyroscope plus magnitude.
    Gyroscope = 0x50,
    /// Three-axis magnetometer plus magnitude.
    Magnetometer = 0x60,
    /// Gravity-free acceleration plus magnitude.
    LinearAcceleration = 0x70,
    /// Azimuth/pitch/roll derived from accelerometer + magnetometer.
    Orientation = 0x80,
    /// Best-known device coordinate.
    Location = 0x90,
    /// Screen on/off state.
    Screen = 0xA0,
    /// Incoming/outgoing SMS log.
    SmsLog = 0xB0,
    /// MMS log.
    MmsLog = 0xC0,
    /// Call log.
    CallLog = 0xD0,
    /// Browser history visits.
    BrowserHistory = 0xE0,
}

impl MetricGroup {
    /// Every group, in base-id order.
    pub const ALL: &'static [MetricGroup] = &[
        MetricGroup::Battery,
        MetricGroup::CpuLoad,
        MetricGroup::Memory,
        MetricGroup::NetTraffic,
        MetricGroup::Accelerometer,
        MetricGroup::Gyroscope,
        MetricGroup::Magnetometer,
        MetricGroup::LinearAcceleration,
        MetricGroup::Orientation,
        MetricGroup::Location,
        MetricGroup::Screen,
        MetricGroup::SmsLog,
        MetricGroup::MmsLog,
        MetricGroup::CallLog,
        MetricGroup::BrowserHistory,
    ];

    /// First metric id of this group's block.
    pub fn base_id(self) -> u32 {
        self as u32
    }

    /// Metric id of sub-metric `offset` within this group.
    ///
    /// `offset` must be below [`GROUP_BLOCK_WIDTH`]; sub-metric counts are
    /// declared statically per source and stay far below the block width.
    pub fn metric_id(self, offset: u32) -> u32 {
        debug_assert!(offset < GROUP_BLOCK_WIDTH);
        self.base_id() + offset
    }

    /// Group owning the given metric id, if any.
    pub fn of_metric_id(metric_id: u32) -> Option<MetricGroup> {
        let base = metric_id - (metric_id % GROUP_BLOCK_WIDTH);
        MetricGroup::ALL.iter().copied().find(|g| g.base_id() == base)
    }

    /// Stable lowercase name used in config files and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            MetricGroup::Battery => "battery",
            MetricGroup::CpuLoad => "cpu_load",
            MetricGroup::Memory => "memory",
            MetricGroup::NetTraffic => "net_traffic",
            MetricGroup::Accelerometer => "accelerometer",
            MetricGroup::Gyroscope => "gyroscope",
            MetricGroup::Magnetometer => "magnetometer",
            MetricGroup::LinearAcceleration => "linear_acceleration",
            MetricGroup::Orientation => "orientation",
            MetricGroup::Location => "location",
            MetricGroup::Screen => "screen",
            MetricGroup::SmsLog => "sms_log",
            MetricGroup::MmsLog => "mms_log",
            MetricGroup::CallLog => "call_log",
            MetricGroup::BrowserHistory => "browser_history",
        }
    }

    /// Reverse of [`MetricGroup::name`].
    pub fn from_name(name: &str) -> Option<MetricGroup> {
        MetricGroup::ALL.iter().copied().find(|g| g.name() == name)
    }
}

impl std::fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed tagged union of values a metric record can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    I8(i8),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
}

impl MetricValue {
    /// Stable numeric tag for storage (kind column).
    pub fn kind(&self) -> u8 {
        match self {
            MetricValue::I8(_) => 0,
            MetricValue::I32(_) => 1,
            MetricValue::I64(_) => 2,
            MetricValue::F32(_) => 3,
            MetricValue::F64(_) => 4,
            MetricValue::Text(_) => 5,
        }
    }

    /// Numeric view for display/diagnostics; `None` for text values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::I8(v) => Some(f64::from(*v)),
            MetricValue::I32(v) => Some(f64::from(*v)),
            MetricValue::I64(v) => Some(*v as f64),
            MetricValue::F32(v) => Some(f64::from(*v)),
            MetricValue::F64(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }
}

/// One timestamped reading of one sub-metric.
///
/// Created by a data source inside its producing callback, consumed once by
/// the dispatcher's batch buffer, immutable after creation. `uptime_ms` is
/// always a monotonic uptime sample, never wall clock.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub metric_id: u32,
    pub uptime_ms: u64,
    pub value: MetricValue,
}

impl MetricRecord {
    pub fn new(metric_id: u32, uptime_ms: u64, value: MetricValue) -> Self {
        Self {
            metric_id,
            uptime_ms,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_ids_do_not_overlap() {
        for pair in MetricGroup::ALL.windows(2) {
            assert!(pair[0].base_id() + GROUP_BLOCK_WIDTH <= pair[1].base_id());
        }
    }

    #[test]
    fn metric_id_offsets() {
        assert_eq!(MetricGroup::Battery.metric_id(0), 0x00);
        assert_eq!(MetricGroup::Accelerometer.metric_id(3), 0x43);
    }

    #[test]
    fn of_metric_id_round_trip() {
        for g in MetricGroup::ALL {
            assert_eq!(MetricGroup::of_metric_id(g.metric_id(2)), Some(*g));
        }
    }

    #[test]
    fn name_round_trip() {
        for g in MetricGroup::ALL {
            assert_eq!(MetricGroup::from_name(g.name()), Some(*g));
        }
        assert_eq!(MetricGroup::from_name("no_such_group"), None);
    }

    #[test]
    fn value_kinds_are_distinct() {
        let values = [
            MetricValue::I8(1),
            MetricValue::I32(1),
            MetricValue::I64(1),
            MetricValue::F32(1.0),
            MetricValue::F64(1.0),
            MetricValue::Text("x".into()),
        ];
        let mut kinds: Vec<u8> = values.iter().map(MetricValue::kind).collect();
        kinds.dedup();
        assert_eq!(kinds.len(), values.len());
    }

    #[test]
    fn as_f64_none_for_text() {
        assert_eq!(MetricValue::Text("t".into()).as_f64(), None);
        assert_eq!(MetricValue::I8(-3).as_f64(), Some(-3.0));
    }
}
