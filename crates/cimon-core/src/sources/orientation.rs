//! OrientationSource — azimuth/pitch/roll derived from the latest
//! accelerometer and magnetometer vectors.
//!
//! Consumes both input groups (declared via `SourceInfo.inputs`) and
//! suppresses output until each has been observed at least once.

use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::event::{CollectionEvent, EventPayload, RegisterParams};
use crate::record::{MetricGroup, MetricRecord, MetricValue};
use crate::source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};
use crate::sources::helpers::read_trimmed;

static ORIENTATION_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::Orientation,
    title: "Orientation",
    description: "Azimuth/pitch/roll from accelerometer + magnetometer",
    kind: SourceKind::Sensor,
    metrics: &[
        SubMetricInfo {
            name: "azimuth",
            units: "deg",
            max_range: 360.0,
            resolution: 0.1,
        },
        SubMetricInfo {
            name: "pitch",
            units: "deg",
            max_range: 180.0,
            resolution: 0.1,
        },
        SubMetricInfo {
            name: "roll",
            units: "deg",
            max_range: 180.0,
            resolution: 0.1,
        },
    ],
    power_ma: 7.0,
    min_period_ms: 10,
    inputs: &[MetricGroup::Accelerometer, MetricGroup::Magnetometer],
};

/// Tilt-compensated device attitude in degrees.
///
/// Axes follow the usual convention: x right, y forward, z up; azimuth is
/// the heading of the +y axis, clockwise from magnetic north.
fn attitude(accel: [f64; 3], mag: [f64; 3]) -> (f64, f64, f64) {
    let [ax, ay, az] = accel;
    let [mx, my, mz] = mag;

    let roll = ay.atan2(az);
    let pitch = (-ax).atan2((ay * ay + az * az).sqrt());

    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let mx_h = mx * cp + mz * sp;
    let my_h = mx * sr * sp + my * cr - mz * sr * cp;
    let azimuth = (-mx_h).atan2(my_h);

    (
        azimuth.to_degrees(),
        pitch.to_degrees(),
        roll.to_degrees(),
    )
}

fn first_three(values: &[f64]) -> Option<[f64; 3]> {
    if values.len() < 3 {
        return None;
    }
    Some([values[0], values[1], values[2]])
}

pub struct OrientationSource {
    timing: SourceTiming,
    probe_base: PathBuf,
    last_accel: Option<[f64; 3]>,
    last_mag: Option<[f64; 3]>,
}

impl OrientationSource {
    pub fn new() -> Self {
        Self {
            timing: SourceTiming::new(100),
            probe_base: PathBuf::from("/sys/bus/iio/devices"),
            last_accel: None,
            last_mag: None,
        }
    }

    /// Probe an alternate sysfs tree (tests).
    pub fn with_probe_base(mut self, base: PathBuf) -> Self {
        self.probe_base = base;
        self
    }

    fn has_device(base: &Path, tag: &str) -> bool {
        let Ok(entries) = std::fs::read_dir(base) else {
            return false;
        };
        entries.flatten().any(|e| {
            read_trimmed(&e.path().join("name")).is_some_and(|name| name.contains(tag))
        })
    }
}

impl Default for OrientationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for OrientationSource {
    fn info(&self) -> &'static SourceInfo {
        &ORIENTATION_INFO
    }

    fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    fn init(&mut self, period_ms: u64) -> bool {
        self.timing = SourceTiming::new(period_ms.max(ORIENTATION_INFO.min_period_ms));
        self.last_accel = None;
        self.last_mag = None;
        // Needs both input sensors to exist.
        self.timing.supported = Self::has_device(&self.probe_base, "accel")
            && Self::has_device(&self.probe_base, "magn");
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
        match reading.group {
            MetricGroup::Accelerometer => self.last_accel = first_three(&reading.values),
            MetricGroup::Magnetometer => self.last_mag = first_three(&reading.values),
            _ => return Vec::new(),
        }
        // No output until both inputs have been observed.
        let (Some(accel), Some(mag)) = (self.last_accel, self.last_mag) else {
            return Vec::new();
        };
        if !self.timing.accept(event.uptime_ms) {
            return Vec::new();
        }
        let (azimuth, pitch, roll) = attitude(accel, mag);
        let group = MetricGroup::Orientation;
        let now = event.uptime_ms;
        vec![
            MetricRecord::new(group.metric_id(0), now, MetricValue::F32(azimuth as f32)),
            MetricRecord::new(group.metric_id(1), now, MetricValue::F32(pitch as f32)),
            MetricRecord::new(group.metric_id(2), now, MetricValue::F32(roll as f32)),
        ]
    }
}
