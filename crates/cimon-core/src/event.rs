//! Typed platform events delivered to the dispatcher.
//!
//! Each event kind carries its own strongly-typed payload; there is no
//! type-erased key/value bag anywhere on the delivery path. The union is
//! closed: a new platform input means a new variant, not a new map key.

use crate::record::MetricGroup;

/// One platform event: the current uptime plus a kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEvent {
    /// Monotonic uptime at delivery, in milliseconds.
    pub uptime_ms: u64,
    pub payload: EventPayload,
}

impl CollectionEvent {
    pub fn new(uptime_ms: u64, payload: EventPayload) -> Self {
        Self { uptime_ms, payload }
    }

    /// Shorthand for the shared low-frequency timer tick.
    pub fn poll_tick(uptime_ms: u64) -> Self {
        Self::new(uptime_ms, EventPayload::PollTick)
    }
}

/// Closed union of event kinds the pipeline understands.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Shared timer tick; fans out to every poll-driven source.
    PollTick,
    /// A raw sensor callback.
    Sensor(SensorReading),
    /// A system broadcast.
    Broadcast(BroadcastSignal),
    /// A content-provider change notification.
    ContentChange(ContentChange),
    /// A location-manager fix.
    Location(LocationFix),
}

impl EventPayload {
    /// Group this event belongs to, or `None` for the shared poll tick.
    pub fn group(&self) -> Option<MetricGroup> {
        match self {
            EventPayload::PollTick => None,
            EventPayload::Sensor(reading) => Some(reading.group),
            EventPayload::Broadcast(signal) => Some(signal.group()),
            EventPayload::ContentChange(change) => Some(change.group),
            EventPayload::Location(_) => Some(MetricGroup::Location),
        }
    }
}

/// One reading from a hardware sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Sensor group the reading came from.
    pub group: MetricGroup,
    /// Axis values in sensor order (e.g. X/Y/Z).
    pub values: Vec<f64>,
    /// Platform-reported accuracy, when available.
    pub accuracy: Option<f64>,
}

impl SensorReading {
    pub fn new(group: MetricGroup, values: Vec<f64>) -> Self {
        Self {
            group,
            values,
            accuracy: None,
        }
    }
}

/// System broadcasts the pipeline subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastSignal {
    ScreenOn,
    ScreenOff,
}

impl BroadcastSignal {
    pub fn group(self) -> MetricGroup {
        match self {
            BroadcastSignal::ScreenOn | BroadcastSignal::ScreenOff => MetricGroup::Screen,
        }
    }
}

/// A content-provider change notification for one observed group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentChange {
    pub group: MetricGroup,
}

/// One coordinate fix from the platform location service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    /// Fix timestamp in milliseconds (platform clock of the fix itself).
    pub time_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Estimated accuracy in meters; `None` when the platform omits it.
    pub accuracy: Option<f64>,
}

/// How the platform should deliver events for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Deliver each event as it occurs.
    #[default]
    Eager,
    /// Allow the platform to coalesce deliveries for power savings.
    Coalesced,
}

/// Named handles passed to every source registration.
///
/// Replaces the original dynamic parameter bag: each call site states
/// exactly what it supplies.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterParams {
    pub delivery: DeliveryMode,
}
