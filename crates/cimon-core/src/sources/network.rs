//! NetTrafficSource — rx/tx byte and packet deltas from `/proc/net/dev`.
//!
//! Counters are summed over every non-loopback interface; each poll emits
//! the delta since the previous poll. The first poll establishes the
//! baseline and emits nothing.

use std::path::PathBuf;

use crate::error::PipelineError;
use crate::event::{CollectionEvent, EventPayload, RegisterParams};
use crate::record::{MetricGroup, MetricRecord, MetricValue};
use crate::source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};
use crate::sources::helpers::read_trimmed;

static NET_INFO: SourceInfo = SourceInfo {
    group: MetricGroup::NetTraffic,
    title: "Network traffic",
    description: "Received/sent bytes and packets across interfaces",
    kind: SourceKind::Poll,
    metrics: &[
        SubMetricInfo {
            name: "rx_bytes",
            units: "B",
            max_range: 1e15,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "tx_bytes",
            units: "B",
            max_range: 1e15,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "rx_packets",
            units: "packets",
            max_range: 1e12,
            resolution: 1.0,
        },
        SubMetricInfo {
            name: "tx_packets",
            units: "packets",
            max_range: 1e12,
            resolution: 1.0,
        },
    ],
    power_ma: 0.1,
    min_period_ms: 500,
    inputs: &[],
};

/// Aggregate interface counters: rx_bytes, tx_bytes, rx_packets, tx_packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct NetCounters {
    rx_bytes: u64,
    tx_bytes: u64,
    rx_packets: u64,
    tx_packets: u64,
}

/// Sum counters over every interface except loopback.
fn parse_net_dev(text: &str) -> NetCounters {
    let mut totals = NetCounters::default();
    for line in text.lines().skip(2) {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        if name.trim() == "lo" {
            continue;
        }
        let fields: Vec<u64> = rest
            .split_whitespace()
            .filter_map(|f| f.parse().ok())
            .collect();
        // Layout: rx bytes, packets, errs, drop, ... then tx at offset 8.
        if fields.len() < 10 {
            continue;
        }
        totals.rx_bytes += fields[0];
        totals.rx_packets += fields[1];
        totals.tx_bytes += fields[8];
        totals.tx_packets += fields[9];
    }
    totals
}

pub struct NetTrafficSource {
    timing: SourceTiming,
    path: PathBuf,
    prev: Option<NetCounters>,
}

impl NetTrafficSource {
    pub fn new() -> Self {
        Self::with_path(PathBuf::from("/proc/net/dev"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            timing: SourceTiming::new(30_000),
            path,
            prev: None,
        }
    }
}

impl Default for NetTrafficSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for NetTrafficSource {
    fn info(&self) -> &'static SourceInfo {
        &NET_INFO
    }

    fn timing(&self) -> &SourceTiming {
        &self.timing
    }

    fn init(&mut self, period_ms: u64) -> bool {
        self.timing = SourceTiming::new(period_ms.max(NET_INFO.min_period_ms));
        self.prev = None;
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
            log::warn!("net dev read failed; no data this cycle");
            return Vec::new();
        };
        let cur = parse_net_dev(&text);
        let Some(prev) = self.prev.replace(cur) else {
            return Vec::new(); // baseline poll
        };
        let group = MetricGroup::NetTraffic;
        let now = event.uptime_ms;
        let delta = |a: u64, b: u64| a.saturating_sub(b) as i64;
        vec![
            MetricRecord::new(
                group.metric_id(0),
                now,
                MetricValue::I64(delta(cur.rx_bytes, prev.rx_bytes)),
            ),
            MetricRecord::new(
                group.metric_id(1),
                now,
                MetricValue::I64(delta(cur.tx_bytes, prev.tx_bytes)),
            ),
            MetricRecord::new(
                group.metric_id(2),
                now,
                MetricValue::I64(delta(cur.rx_packets, prev.rx_packets)),
            ),
            MetricRecord::new(
                group.metric_id(3),
                now,
                MetricValue::I64(delta(cur.tx_packets, prev.tx_packets)),
            ),
        ]
    }
}
