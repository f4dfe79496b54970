//! The polymorphic data-source contract and per-source timing state.
//!
//! Every monitored metric group implements [`DataSource`]: static metadata
//! via [`SourceInfo`], a capability probe at init time, idempotent
//! registration against the platform event stream, and `produce`, which
//! turns one qualifying event into zero or more records.

use crate::error::PipelineError;
use crate::event::{CollectionEvent, RegisterParams};
use crate::record::{MetricGroup, MetricRecord};

/// How a source is driven by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Sampled on the shared poll tick.
    Poll,
    /// Fed by raw sensor callbacks.
    Sensor,
    /// Fed by system broadcasts.
    Broadcast,
    /// Fed by content-provider change notifications.
    ContentObserver,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poll => write!(f, "poll"),
            Self::Sensor => write!(f, "sensor"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::ContentObserver => write!(f, "content"),
        }
    }
}

/// Metadata for one sub-metric within a group.
#[derive(Debug, Clone, Copy)]
pub struct SubMetricInfo {
    /// Sub-metric name (e.g. `"x"`, `"level"`).
    pub name: &'static str,
    /// Measurement units (e.g. `"m/s^2"`, `"%"`).
    pub units: &'static str,
    /// Maximum plausible value.
    pub max_range: f64,
    /// Smallest distinguishable step.
    pub resolution: f64,
}

/// Static metadata about a metric group.
///
/// Each source declares one of these as a `static`; `info()` hands out the
/// same instance for the life of the process. The declared sub-metrics feed
/// the metadata store once per app-version bump — this is not a runtime
/// hot path.
#[derive(Debug)]
pub struct SourceInfo {
    /// Group identity; also the base of the group's metric-id block.
    pub group: MetricGroup,
    /// Human-readable title.
    pub title: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// How the platform drives this source.
    pub kind: SourceKind,
    /// Declared sub-metrics, in metric-id-offset order.
    pub metrics: &'static [SubMetricInfo],
    /// Nominal power draw while registered, in milliamps.
    pub power_ma: f64,
    /// Smallest sampling period the source accepts, in milliseconds.
    pub min_period_ms: u64,
    /// Groups a derived source consumes in addition to its own events.
    pub inputs: &'static [MetricGroup],
}

/// Sampling-period state shared by every source.
///
/// The throttle rule: an event at `now` is accepted iff
/// `now − last_fired ≥ period − skew`; otherwise the event produces nothing
/// and `last_fired` is unchanged. The skew absorbs early-firing timer
/// jitter — platform timers do not hit exact multiples of the period.
#[derive(Debug, Clone)]
pub struct SourceTiming {
    pub period_ms: u64,
    pub skew_ms: u64,
    pub last_fired_ms: Option<u64>,
    /// False when the platform capability is absent on this device.
    pub supported: bool,
    /// True while attached to the platform event stream.
    pub registered: bool,
}

impl SourceTiming {
    /// Timing state for the given period, with the default skew
    /// (one twentieth of the period).
    pub fn new(period_ms: u64) -> Self {
        Self::with_skew(period_ms, period_ms / 20)
    }

    pub fn with_skew(period_ms: u64, skew_ms: u64) -> Self {
        Self {
            period_ms,
            skew_ms,
            last_fired_ms: None,
            supported: true,
            registered: false,
        }
    }

    /// Apply the throttle rule at uptime `now_ms`.
    ///
    /// Returns true (and records the firing) when the source should sample
    /// this cycle. The first event after configuration always fires.
    pub fn accept(&mut self, now_ms: u64) -> bool {
        match self.last_fired_ms {
            Some(last) if now_ms.saturating_sub(last) < self.period_ms.saturating_sub(self.skew_ms) => {
                false
            }
            _ => {
                self.last_fired_ms = Some(now_ms);
                true
            }
        }
    }
}

/// Trait every data source implements.
///
/// Lifecycle: constructed once at startup, `init` configures timing and
/// probes the platform capability, `register` attaches to the live event
/// stream, `produce` runs per qualifying event, `unregister` releases the
/// platform handles at session stop.
pub trait DataSource: Send {
    /// Static group metadata.
    fn info(&self) -> &'static SourceInfo;

    /// Current timing/support state.
    fn timing(&self) -> &SourceTiming;

    /// Configure the source for sampling period `period_ms` and probe the
    /// underlying platform capability.
    ///
    /// Returns false when the capability is absent; an unsupported source
    /// is silently excluded from registration and production, never an
    /// error.
    fn init(&mut self, period_ms: u64) -> bool;

    /// Attach to the platform event stream.
    ///
    /// Must be idempotent: a second call while registered is a no-op, so a
    /// routing-layer bug can never double-subscribe a sensor listener.
    fn register(&mut self, params: &RegisterParams) -> Result<(), PipelineError>;

    /// Release platform handles. Safe to call when not registered.
    fn unregister(&mut self);

    /// Turn one event into records, applying the source's own throttle and
    /// state. Returns an empty vec when throttled or when the event
    /// carries nothing for this source.
    fn produce(&mut self, event: &CollectionEvent) -> Vec<MetricRecord>;

    /// Convenience: group from info.
    fn group(&self) -> MetricGroup {
        self.info().group
    }
}
