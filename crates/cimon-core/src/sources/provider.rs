//! Content-log sources: SMS, MMS, call log, browser history.
//!
//! All four observe a monotonically-growing provider table through the
//! [`RowProvider`] collaborator. The source remembers the highest row id it
//! has seen and emits only strictly newer rows, oldest first. An empty
//! cursor is "no new rows", and a failed query is "no data this cycle" —
//! neither is an error.

use crate::error::PipelineError;
use crate::event::{CollectionEvent, EventPayload, RegisterParams};
use crate::record::{MetricGroup, MetricRecord, MetricValue};
use crate::source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};

/// One row fetched from a provider table, with values in sub-metric order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRow {
    pub row_id: i64,
    pub values: Vec<MetricValue>,
}

/// Platform collaborator wrapping one observable provider table.
pub trait RowProvider: Send {
    /// Rows with id strictly greater than `last_row_id`, in any order.
    fn rows_after(&mut self, last_row_id: i64) -> std::io::Result<Vec<ProviderRow>>;
}

static SMS_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::SmsLog,
    title: "SMS log",
    description: "Incoming/outgoing text messages",
    kind: SourceKind::ContentObserver,
    metrics: &[
        SubMetricInfo {
            name: "direction",
            units: "in/out",
            max_range: 2.0,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "length",
            units: "chars",
            max_range: 10_000.0,
            resolution: 1.0,
        },
    ],
    power_ma: 0.5,
    min_period_ms: 1_000,
    inputs: &[],
};

static MMS_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::MmsLog,
    title: "MMS log",
    description: "Multimedia messages",
    kind: SourceKind::ContentObserver,
    metrics: &[
        SubMetricInfo {
            name: "direction",
            units: "in/out",
            max_range: 2.0,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "size",
            units: "B",
            max_range: 1e9,
            resolution: 1.0,
        },
    ],
    power_ma: 0.5,
    min_period_ms: 1_000,
    inputs: &[],
};

static CALL_LOG_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::CallLog,
    title: "Call log",
    description: "Phone call history",
    kind: SourceKind::ContentObserver,
    metrics: &[
        SubMetricInfo {
            name: "direction",
            units: "in/out/missed",
            max_range: 3.0,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "duration",
            units: "s",
            max_range: 86_400.0,
            resolution: 1.0,
        },
    ],
    power_ma: 0.5,
    min_period_ms: 1_000,
    inputs: &[],
};

static BROWSER_HISTORY_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::BrowserHistory,
    title: "Browser history",
    description: "Page visit counts",
    kind: SourceKind::ContentObserver,
    metrics: &[SubMetricInfo {
        name: "visits",
        units: "count",
        max_range: 1e6,
        resolution: 1.0,
    }],
    power_ma: 0.5,
    min_period_ms: 1_000,
    inputs: &[],
};

/// Generic catch-up source over one provider table; see the constructors.
pub struct ContentLogSource {
    info: &'static SourceInfo,
    timing: SourceTiming,
    provider: Box<dyn RowProvider>,
    last_row_id: i64,
}

impl ContentLogSource {
    pub fn sms(provider: Box<dyn RowProvider>) -> Self {
        Self::with_info(&SMS_INFO, provider)
    }

    pub fn mms(provider: Box<dyn RowProvider>) -> Self {
        Self::with_info(&MMS_INFO, provider)
    }

    pub fn call_log(provider: Box<dyn RowProvider>) -> Self {
        Self::with_info(&CALL_LOG_INFO, provider)
    }

    pub fn browser_history(provider: Box<dyn RowProvider>) -> Self {
        Self::with_info(&BROWSER_HISTORY_INFO, provider)
    }

    fn with_info(info: &'static SourceInfo, provider: Box<dyn RowProvider>) -> Self {
        Self {
            info,
            timing: SourceTiming::new(info.min_period_ms),
            provider,
            last_row_id: 0,
        }
    }

    /// Start from an already-seen row id instead of the table start.
    pub fn with_seen_row(mut self, row_id: i64) -> Self {
        self.last_row_id = row_id;
        self
    }

    /// Highest row id observed so far.
    pub fn seen_row(&self) -> i64 {
        self.last_row_id
    }
}

impl DataSource for ContentLogSource {
    fn info(&self) -> &'static SourceInfo {
        self.info
    }

    fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    fn init(&mut self, period_ms: u64) -> bool {
        self.timing = SourceTiming::new(period_ms.max(self.info.min_period_ms));
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
        let EventPayload::ContentChange(change) = &event.payload else {
            return Vec::new();
        };
        if change.group != self.info.group {
            return Vec::new();
        }
        if !self.timing.accept(event.uptime_ms) {
            return Vec::new();
        }

        let mut rows = match self.provider.rows_after(self.last_row_id) {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("provider query for '{}' failed: {e}", self.info.group);
                return Vec::new();
            }
        };
        // Oldest first, strictly newer than anything already emitted.
        rows.sort_by_key(|r| r.row_id);
        rows.retain(|r| r.row_id > self.last_row_id);

        let group = self.info.group;
        let width = self.info.metrics.len();
        let now = event.uptime_ms;
        let mut records = Vec::new();
        for row in rows {
            self.last_row_id = row.row_id;
            for (i, value) in row.values.into_iter().take(width).enumerate() {
                records.push(MetricRecord::new(group.metric_id(i as u32), now, value));
            }
        }
        records
    }
}
