//! ScreenSource — screen on/off transitions from system broadcasts.
//!
//! The configured period acts as a minimum acceptance interval, not a poll
//! rate: transitions arrive whenever the platform sends them.

use crate::error::PipelineError;
use crate::event::{BroadcastSignal, CollectionEvent, EventPayload, RegisterParams};
use crate::record::{MetricGroup, MetricRecord, MetricValue};
use crate::source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};

static SCREEN_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::Screen,
    title: "Screen",
    description: "Screen on/off state",
    kind: SourceKind::Broadcast,
    metrics: &[SubMetricInfo {
        name: "state",
        units: "on/off",
        max_range: 1.0,
        resolution: 1.0,
    }],
    power_ma: 0.0,
    min_period_ms: 0,
    inputs: &[],
};

pub struct ScreenSource {
    timing: SourceTiming,
}

impl ScreenSource {
    pub fn new() -> Self {
        Self {
            timing: SourceTiming::new(1_000),
        }
    }
}

impl Default for ScreenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for ScreenSource {
    fn info(&self) -> &'static SourceInfo {
        &SCREEN_INFO
    }

    fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    fn init(&mut self, period_ms: u64) -> bool {
        self.timing = SourceTiming::new(period_ms);
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
        let EventPayload::Broadcast(signal) = &event.payload else {
            return Vec::new();
        };
        let state = match signal {
            BroadcastSignal::ScreenOn => 1,
            BroadcastSignal::ScreenOff => 0,
        };
        if !self.timing.accept(event.uptime_ms) {
            return Vec::new();
        }
        vec![MetricRecord::new(
            MetricGroup::Screen.metric_id(0),
            event.uptime_ms,
            MetricValue::I8(state),
        )]
    }
}
