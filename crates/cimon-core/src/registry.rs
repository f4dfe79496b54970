//! Singleton-per-group source registry.
//!
//! At most one live source exists per metric group process-wide; the
//! registry enforces that at insertion time, which keeps duplicate platform
//! subscriptions structurally impossible. Built once at startup, before any
//! event delivery begins.

use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::record::MetricGroup;
use crate::source::DataSource;

/// Runtime bookkeeping for one registered source.
pub struct SourceRuntime {
    pub source: Box<dyn DataSource>,
    /// Events routed to this source, accepted or not.
    pub events_routed: u64,
    /// Records the source has produced this session.
    pub records_produced: u64,
    /// Panics or registration failures observed.
    pub failures: u64,
    /// Uptime of the first event that produced records.
    pub first_output_ms: Option<u64>,
    /// Uptime of the most recent event that produced records.
    pub last_output_ms: Option<u64>,
}

impl SourceRuntime {
    fn new(source: Box<dyn DataSource>) -> Self {
        Self {
            source,
            events_routed: 0,
            records_produced: 0,
            failures: 0,
            first_output_ms: None,
            last_output_ms: None,
        }
    }

    /// Reset per-session counters.
    pub fn reset_session_stats(&mut self) {
        self.events_routed = 0;
        self.records_produced = 0;
        self.failures = 0;
        self.first_output_ms = None;
        self.last_output_ms = None;
    }

    /// Record that `count` records were produced at uptime `now_ms`.
    pub fn note_output(&mut self, now_ms: u64, count: usize) {
        self.records_produced += count as u64;
        if self.first_output_ms.is_none() {
            self.first_output_ms = Some(now_ms);
        }
        self.last_output_ms = Some(now_ms);
    }

    /// Observed production rate in records per second, when enough output
    /// exists to measure one.
    pub fn observed_hz(&self) -> Option<f64> {
        let (first, last) = (self.first_output_ms?, self.last_output_ms?);
        let span_ms = last.checked_sub(first)?;
        if span_ms == 0 {
            return None;
        }
        Some(self.records_produced as f64 * 1000.0 / span_ms as f64)
    }
}

/// Map from metric group to its single live source.
#[derive(Default)]
pub struct SourceRegistry {
    sources: BTreeMap<MetricGroup, SourceRuntime>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, failing fast if the group already has one.
    pub fn insert(&mut self, source: Box<dyn DataSource>) -> Result<(), PipelineError> {
        let group = source.group();
        if self.sources.contains_key(&group) {
            return Err(PipelineError::DuplicateSource(group));
        }
        self.sources.insert(group, SourceRuntime::new(source));
        Ok(())
    }

    pub fn get_mut(&mut self, group: MetricGroup) -> Option<&mut SourceRuntime> {
        self.sources.get_mut(&group)
    }

    pub fn get(&self, group: MetricGroup) -> Option<&SourceRuntime> {
        self.sources.get(&group)
    }

    pub fn contains(&self, group: MetricGroup) -> bool {
        self.sources.contains_key(&group)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Groups currently registered, in base-id order.
    pub fn groups(&self) -> Vec<MetricGroup> {
        self.sources.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricGroup, &SourceRuntime)> {
        self.sources.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&MetricGroup, &mut SourceRuntime)> {
        self.sources.iter_mut()
    }
}
