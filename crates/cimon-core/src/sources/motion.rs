//! Vector motion sensors: accelerometer, gyroscope, magnetometer, linear
//! acceleration.
//!
//! All four share one shape — consume a three-axis reading, throttle by the
//! configured minimum interval, emit X/Y/Z plus the Euclidean magnitude as
//! the final sub-metric. Capability is probed against the IIO sysfs tree at
//! init time; a device without the sensor is excluded silently.

use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::event::{CollectionEvent, EventPayload, RegisterParams};
use crate::record::{MetricGroup, MetricRecord, MetricValue};
use crate::source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};
use crate::sources::helpers::{magnitude, read_trimmed};

const DEFAULT_IIO_BASE: &str = "/sys/bus/iio/devices";

macro_rules! axes_metrics {
    ($units:expr, $max:expr, $res:expr) => {
        &[
            SubMetricInfo {
                name: "x",
                units: $units,
                max_range: $max,
                resolution: $res,
            },
            SubMetricInfo {
                name: "y",
                units: $units,
                max_range: $max,
                resolution: $res,
            },
            SubMetricInfo {
                name: "z",
                units: $units,
                max_range: $max,
                resolution: $res,
            },
            SubMetricInfo {
                name: "magnitude",
                units: $units,
                max_range: $max,
                resolution: $res,
            },
        ]
    };
}

static ACCELEROMETER_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::Accelerometer,
    title: "Accelerometer",
    description: "Three-axis acceleration including gravity",
    kind: SourceKind::Sensor,
    metrics: axes_metrics!("m/s^2", 39.2, 0.01),
    power_ma: 0.25,
    min_period_ms: 10,
    inputs: &[],
};

static GYROSCOPE_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::Gyroscope,
    title: "Gyroscope",
    description: "Three-axis angular velocity",
    kind: SourceKind::Sensor,
    metrics: axes_metrics!("rad/s", 34.9, 0.001),
    power_ma: 6.1,
    min_period_ms: 10,
    inputs: &[],
};

static MAGNETOMETER_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::Magnetometer,
    title: "Magnetometer",
    description: "Three-axis ambient magnetic field",
    kind: SourceKind::Sensor,
    metrics: axes_metrics!("uT", 2000.0, 0.1),
    power_ma: 6.8,
    min_period_ms: 10,
    inputs: &[],
};

static LINEAR_ACCELERATION_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::LinearAcceleration,
    title: "Linear acceleration",
    description: "Three-axis acceleration with gravity removed",
    kind: SourceKind::Sensor,
    metrics: axes_metrics!("m/s^2", 39.2, 0.01),
    power_ma: 0.25,
    min_period_ms: 10,
    inputs: &[],
};

/// True when any IIO device name matches one of the tags.
fn iio_has_device(base: &Path, tags: &[&str]) -> bool {
    let Ok(entries) = std::fs::read_dir(base) else {
        return false;
    };
    for entry in entries.flatten() {
        if let Some(name) = read_trimmed(&entry.path().join("name")) {
            if tags.iter().any(|tag| name.contains(tag)) {
                return true;
            }
        }
    }
    false
}

/// One three-axis sensor source; see the four constructors.
pub struct VectorSensorSource {
    info: &'static SourceInfo,
    probe_tags: &'static [&'static str],
    probe_base: PathBuf,
    timing: SourceTiming,
}

impl VectorSensorSource {
    pub fn accelerometer() -> Self {
        Self::with_info(&ACCELEROMETER_INFO, &["accel"])
    }

    pub fn gyroscope() -> Self {
        Self::with_info(&GYROSCOPE_INFO, &["gyro", "anglvel"])
    }

    pub fn magnetometer() -> Self {
        Self::with_info(&MAGNETOMETER_INFO, &["magn"])
    }

    /// Derived from the accelerometer feed, so it probes for the same
    /// hardware.
    pub fn linear_acceleration() -> Self {
        Self::with_info(&LINEAR_ACCELERATION_INFO, &["accel"])
    }

    fn with_info(info: &'static SourceInfo, probe_tags: &'static [&'static str]) -> Self {
        Self {
            info,
            probe_tags,
            probe_base: PathBuf::from(DEFAULT_IIO_BASE),
            timing: SourceTiming::new(100),
        }
    }

    /// Probe an alternate sysfs tree (tests).
    pub fn with_probe_base(mut self, base: PathBuf) -> Self {
        self.probe_base = base;
        self
    }
}

impl DataSource for VectorSensorSource {
    fn info(&self) -> &'static SourceInfo {
        self.info
    }

    fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    fn init(&mut self, period_ms: u64) -> bool {
        self.timing = SourceTiming::new(period_ms.max(self.info.min_period_ms));
        self.timing.supported = iio_has_device(&self.probe_base, self.probe_tags);
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
        let EventPayload::Sensor(reading) = &event.payload else {
            return Vec::new();
        };
        if reading.group != self.info.group || reading.values.len() < 3 {
            return Vec::new();
        }
        if !self.timing.accept(event.uptime_ms) {
            return Vec::new();
        }
        let axes = &reading.values[..3];
        let group = self.info.group;
        let now = event.uptime_ms;
        let mut records: Vec<MetricRecord> = axes
            .iter()
            .enumerate()
            .map(|(i, v)| {
                MetricRecord::new(group.metric_id(i as u32), now, MetricValue::F32(*v as f32))
            })
            .collect();
        records.push(MetricRecord::new(
            group.metric_id(3),
            now,
            MetricValue::F32(magnitude(axes) as f32),
        ));
        records
    }
}
