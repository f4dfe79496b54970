//! LocationSource — retains the best-known coordinate and emits it on the
//! sampling period.
//!
//! Incoming fixes replace the retained one only when the quality heuristic
//! favors them: one second of staleness trades against one meter of
//! accuracy loss.

use crate::error::PipelineError;
use crate::event::{CollectionEvent, EventPayload, LocationFix, RegisterParams};
use crate::record::{MetricGroup, MetricRecord, MetricValue};
use crate::source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};

static LOCATION_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::Location,
    title: "Location",
    description: "Best-known device coordinate",
    kind: SourceKind::Poll,
    metrics: &[
        SubMetricInfo {
            name: "latitude",
            units: "deg",
            max_range: 90.0,
            resolution: 1e-6,
        },
        SubMetricInfo {
            name: "longitude",
            units: "deg",
            max_range: 180.0,
            resolution: 1e-6,
        },
        SubMetricInfo {
            name: "accuracy",
            units: "m",
            max_range: 10_000.0,
            resolution: 0.1,
        },
    ],
    power_ma: 21.0,
    min_period_ms: 1_000,
    inputs: &[],
};

/// Decide whether `new` should replace `old`.
///
/// Rejects the new fix iff `(time_old − time_new)/1000 > acc_old − acc_new`;
/// when either side lacks accuracy the accuracy delta is zero, so a newer
/// fix always wins.
fn favors_new(old: &LocationFix, new: &LocationFix) -> bool {
    let staleness_s = (old.time_ms - new.time_ms) as f64 / 1000.0;
    let accuracy_gain = match (old.accuracy, new.accuracy) {
        (Some(old_acc), Some(new_acc)) => old_acc - new_acc,
        _ => 0.0,
    };
    staleness_s <= accuracy_gain
}

pub struct LocationSource {
    timing: SourceTiming,
    best: Option<LocationFix>,
}

impl LocationSource {
    pub fn new() -> Self {
        Self {
            timing: SourceTiming::new(60_000),
            best: None,
        }
    }
}

impl Default for LocationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for LocationSource {
    fn info(&self) -> &'static SourceInfo {
        &LOCATION_INFO
    }

    fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    fn init(&mut self, period_ms: u64) -> bool {
        self.timing = SourceTiming::new(period_ms.max(LOCATION_INFO.min_period_ms));
        self.best = None;
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
        match &event.payload {
            EventPayload::Location(fix) => {
                let keep = match &self.best {
                    Some(old) => favors_new(old, fix),
                    None => true,
                };
                if keep {
                    self.best = Some(*fix);
                }
                Vec::new()
            }
            EventPayload::PollTick => {
                let Some(fix) = self.best else {
                    return Vec::new();
                };
                if !self.timing.accept(event.uptime_ms) {
                    return Vec::new();
                }
                let group = MetricGroup::Location;
                let now = event.uptime_ms;
                let mut records = vec![
                    MetricRecord::new(group.metric_id(0), now, MetricValue::F64(fix.latitude)),
                    MetricRecord::new(group.metric_id(1), now, MetricValue::F64(fix.longitude)),
                ];
                if let Some(accuracy) = fix.accuracy {
                    records.push(MetricRecord::new(
                        group.metric_id(2),
                        now,
                        MetricValue::F32(accuracy as f32),
                    ));
                }
                records
            }
            _ => Vec::new(),
        }
    }
}
