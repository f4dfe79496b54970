//! Collection dispatcher: owns the registered sources, routes platform
//! events, and feeds the batch machinery.
//!
//! Event delivery is single-threaded; everything here other than the O(1)
//! buffer swap is pure computation. Persistence runs on the batch writer's
//! worker threads, so no flush ever blocks the delivery path.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch::{BatchBuffer, BatchWriter, RecordSink};
use crate::error::PipelineError;
use crate::event::{CollectionEvent, DeliveryMode, RegisterParams};
use crate::monitor::{MonitorId, MonitorStore, TimeBase};
use crate::record::MetricGroup;
use crate::registry::SourceRegistry;
use crate::source::{DataSource, SourceInfo, SourceKind};
use crate::time;

/// Default batch-buffer threshold.
pub const DEFAULT_BATCH_THRESHOLD: usize = 500;

/// Sampling assignment for one source in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSchedule {
    pub group: MetricGroup,
    /// Sampling period in milliseconds (minimum acceptance interval for
    /// callback-driven sources).
    pub period_ms: u64,
    /// Stop routing to this source after this long into the session.
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Configuration applied at session start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub schedules: Vec<SourceSchedule>,
    pub delivery: DeliveryMode,
    pub batch_threshold: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            schedules: Vec::new(),
            delivery: DeliveryMode::Eager,
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
        }
    }
}

struct ActiveSession {
    monitor: MonitorId,
    started: TimeBase,
    /// Scheduled groups with their optional duration cap.
    schedule: BTreeMap<MetricGroup, Option<u64>>,
}

/// Per-source counters reported when a session stops.
#[derive(Debug, Clone)]
pub struct SourceSessionStats {
    pub group: MetricGroup,
    pub events_routed: u64,
    pub records_produced: u64,
    pub failures: u64,
    /// Observed production rate; diagnostic only.
    pub observed_hz: Option<f64>,
}

/// Summary statistics returned by `stop_session`.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub monitor: MonitorId,
    pub duration_ms: u64,
    pub sources: Vec<SourceSessionStats>,
}

/// Support/registration snapshot of one source, for display.
pub struct SourceStatus {
    pub info: &'static SourceInfo,
    pub supported: bool,
    pub registered: bool,
}

/// The central coordinator of the collection pipeline.
pub struct Dispatcher {
    registry: SourceRegistry,
    buffer: BatchBuffer,
    writer: BatchWriter,
    monitors: Arc<dyn MonitorStore>,
    session: Option<ActiveSession>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn RecordSink>, monitors: Arc<dyn MonitorStore>) -> Self {
        Self {
            registry: SourceRegistry::new(),
            buffer: BatchBuffer::new(DEFAULT_BATCH_THRESHOLD),
            writer: BatchWriter::new(sink),
            monitors,
            session: None,
        }
    }

    /// Register a source; fails fast on a duplicate group.
    pub fn add_source(&mut self, source: Box<dyn DataSource>) -> Result<(), PipelineError> {
        self.registry.insert(source)
    }

    pub fn source_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Records currently buffered and not yet handed to a flush.
    pub fn buffered_records(&self) -> usize {
        self.buffer.len()
    }

    /// Support/registration snapshot for every known source.
    pub fn source_statuses(&self) -> Vec<SourceStatus> {
        self.registry
            .iter()
            .map(|(_, rt)| SourceStatus {
                info: rt.source.info(),
                supported: rt.source.timing().supported,
                registered: rt.source.timing().registered,
            })
            .collect()
    }

    /// Start a collection session now.
    pub fn start_session(&mut self, config: &SessionConfig) -> Result<MonitorId, PipelineError> {
        self.start_session_at(config, TimeBase::now())
    }

    /// Start a collection session with an explicit clock sample.
    ///
    /// The monitor is resolved before any source registers, so every record
    /// that reaches the sink references an already-persisted monitor row.
    pub fn start_session_at(
        &mut self,
        config: &SessionConfig,
        started: TimeBase,
    ) -> Result<MonitorId, PipelineError> {
        if self.session.is_some() {
            return Err(PipelineError::SessionActive);
        }

        let monitor = self.monitors.resolve_monitor(&started)?;
        self.buffer.set_threshold(config.batch_threshold.max(1));

        let params = RegisterParams {
            delivery: config.delivery,
        };
        let mut schedule = BTreeMap::new();
        for entry in &config.schedules {
            let Some(rt) = self.registry.get_mut(entry.group) else {
                log::warn!("schedule names unknown group '{}'", entry.group);
                continue;
            };
            rt.reset_session_stats();
            if !rt.source.init(entry.period_ms) {
                log::info!("source '{}' not supported on this device", entry.group);
                continue;
            }
            if let Err(e) = rt.source.register(&params) {
                rt.failures += 1;
                log::warn!("source '{}' failed to register: {e}", entry.group);
                continue;
            }
            schedule.insert(entry.group, entry.duration_ms);
        }

        log::info!(
            "session started: monitor {monitor}, {} of {} sources registered",
            schedule.len(),
            self.registry.len()
        );
        self.session = Some(ActiveSession {
            monitor,
            started,
            schedule,
        });
        Ok(monitor)
    }

    /// Deliver one platform event.
    ///
    /// Routes to the matching source (and any derived source consuming that
    /// group), appends produced records to the batch buffer, and hands a
    /// full buffer to an asynchronous flush. A source that panics or
    /// returns nothing counts as "no data this cycle"; the loop continues.
    pub fn on_event(&mut self, event: &CollectionEvent) {
        let Some(session) = &self.session else {
            log::debug!("event dropped: no active session");
            return;
        };
        let monitor = session.monitor;
        let elapsed_ms = event.uptime_ms.saturating_sub(session.started.uptime_ms);

        let targets = self.route_targets(event, elapsed_ms);
        if targets.is_empty() {
            return;
        }

        let mut produced = Vec::new();
        for group in targets {
            let Some(rt) = self.registry.get_mut(group) else {
                continue;
            };
            rt.events_routed += 1;
            let result = catch_unwind(AssertUnwindSafe(|| rt.source.produce(event)));
            match result {
                Ok(records) if !records.is_empty() => {
                    rt.note_output(event.uptime_ms, records.len());
                    produced.extend(records);
                }
                Ok(_) => {}
                Err(_) => {
                    rt.failures += 1;
                    log::warn!("source '{group}' panicked in produce; continuing");
                }
            }
        }

        if let Some(batch) = self.buffer.push_all(produced) {
            self.writer.flush_async(monitor, batch);
        }
    }

    /// Groups the event should reach, honoring schedule and duration caps.
    fn route_targets(&self, event: &CollectionEvent, elapsed_ms: u64) -> Vec<MetricGroup> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        let in_schedule = |group: MetricGroup| match session.schedule.get(&group) {
            Some(Some(duration)) => elapsed_ms <= *duration,
            Some(None) => true,
            None => false,
        };

        match event.payload.group() {
            // The shared tick fans out to every scheduled poll-driven source.
            None => self
                .registry
                .iter()
                .filter(|(g, rt)| {
                    rt.source.info().kind == SourceKind::Poll
                        && rt.source.timing().supported
                        && in_schedule(**g)
                })
                .map(|(g, _)| *g)
                .collect(),
            Some(group) => {
                let mut targets = Vec::new();
                if let Some(rt) = self.registry.get(group) {
                    if rt.source.timing().supported && in_schedule(group) {
                        targets.push(group);
                    }
                }
                // Derived sources that consume this group as an input.
                for (g, rt) in self.registry.iter() {
                    if *g != group
                        && rt.source.info().inputs.contains(&group)
                        && rt.source.timing().supported
                        && in_schedule(*g)
                    {
                        targets.push(*g);
                    }
                }
                targets
            }
        }
    }

    /// Stop the session: unregister every source, flush what remains, and
    /// return summary statistics.
    ///
    /// Teardown order is fixed — unregister (so nothing new is produced),
    /// flush, end the monitor — and each step continues past per-source
    /// failures.
    pub fn stop_session(&mut self) -> Result<SessionSummary, PipelineError> {
        let session = self.session.take().ok_or(PipelineError::NoSession)?;

        for (group, rt) in self.registry.iter_mut() {
            if catch_unwind(AssertUnwindSafe(|| rt.source.unregister())).is_err() {
                rt.failures += 1;
                log::warn!("source '{group}' panicked in unregister; continuing");
            }
        }

        let remaining = self.buffer.drain();
        self.writer.flush_blocking(session.monitor, remaining);
        self.writer.join_all();

        let end_uptime_ms = time::uptime_ms();
        if let Err(e) = self.monitors.end_monitor(session.monitor, end_uptime_ms) {
            log::error!("failed to end monitor {}: {e}", session.monitor);
        }

        let sources = self
            .registry
            .iter()
            .filter(|(_, rt)| rt.events_routed > 0)
            .map(|(g, rt)| SourceSessionStats {
                group: *g,
                events_routed: rt.events_routed,
                records_produced: rt.records_produced,
                failures: rt.failures,
                observed_hz: rt.observed_hz(),
            })
            .collect();

        let summary = SessionSummary {
            monitor: session.monitor,
            duration_ms: end_uptime_ms.saturating_sub(session.started.uptime_ms),
            sources,
        };
        log::info!("session stopped: monitor {}", summary.monitor);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, SensorReading};
    use crate::record::{MetricRecord, MetricValue};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    // -----------------------------------------------------------------------
    // Mock sources, sink, monitor store
    // -----------------------------------------------------------------------

    static POLL_A_INFO: SourceInfo = SourceInfo {
        group: MetricGroup::Battery,
        title: "Poll A",
        description: "test poll source",
        kind: SourceKind::Poll,
        metrics: &[],
        power_ma: 0.0,
        min_period_ms: 0,
        inputs: &[],
    };
    static POLL_B_INFO: SourceInfo = SourceInfo {
        group: MetricGroup::Memory,
        title: "Poll B",
        description: "test poll source",
        kind: SourceKind::Poll,
        metrics: &[],
        power_ma: 0.0,
        min_period_ms: 0,
        inputs: &[],
    };
    static SENSOR_INFO: SourceInfo = SourceInfo {
        group: MetricGroup::Accelerometer,
        title: "Sensor",
        description: "test sensor source",
        kind: SourceKind::Sensor,
        metrics: &[],
        power_ma: 0.0,
        min_period_ms: 0,
        inputs: &[],
    };
    static DERIVED_INFO: SourceInfo = SourceInfo {
        group: MetricGroup::Orientation,
        title: "Derived",
        description: "test derived source",
        kind: SourceKind::Sensor,
        metrics: &[],
        power_ma: 0.0,
        min_period_ms: 0,
        inputs: &[MetricGroup::Accelerometer, MetricGroup::Magnetometer],
    };

    /// Emits one record per routed event. Optionally unsupported or panicking.
    struct ScriptedSource {
        info: &'static SourceInfo,
        timing: crate::source::SourceTiming,
        supported: bool,
        panic_in_produce: bool,
    }

    impl ScriptedSource {
        fn new(info: &'static SourceInfo) -> Self {
            Self {
                info,
                timing: crate::source::SourceTiming::new(0),
                supported: true,
                panic_in_produce: false,
            }
        }

        fn unsupported(info: &'static SourceInfo) -> Self {
            Self {
                supported: false,
                ..Self::new(info)
            }
        }

        fn panicking(info: &'static SourceInfo) -> Self {
            Self {
                panic_in_produce: true,
                ..Self::new(info)
            }
        }
    }

    impl DataSource for ScriptedSource {
        fn info(&self) -> &'static SourceInfo {
            self.info
        }
        fn timing(&self) -> &crate::source::SourceTiming {
            &self.timing
        }
        fn init(&mut self, period_ms: u64) -> bool {
            self.timing = crate::source::SourceTiming::with_skew(period_ms, 0);
            self.timing.supported = self.supported;
            self.supported
        }
        fn register(&mut self, _params: &RegisterParams) -> Result<(), PipelineError> {
            self.timing.registered = true;
            Ok(())
        }
        fn unregister(&mut self) {
            self.timing.registered = false;
        }
        fn produce(&mut self, event: &CollectionEvent) -> Vec<MetricRecord> {
            if self.panic_in_produce {
                panic!("scripted panic");
            }
            vec![MetricRecord::new(
                self.info.group.metric_id(0),
                event.uptime_ms,
                MetricValue::I64(1),
            )]
        }
    }

    #[derive(Default)]
    struct MemorySink {
        batches: Mutex<Vec<(MonitorId, Vec<MetricRecord>)>>,
        fail: bool,
    }

    impl MemorySink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn record_count(&self) -> usize {
            self.batches.lock().unwrap().iter().map(|(_, b)| b.len()).sum()
        }
    }

    impl RecordSink for MemorySink {
        fn write_batch(
            &self,
            monitor: MonitorId,
            records: &[MetricRecord],
        ) -> Result<(), PipelineError> {
            if self.fail {
                return Err(PipelineError::Sink("injected".into()));
            }
            self.batches
                .lock()
                .unwrap()
                .push((monitor, records.to_vec()));
            Ok(())
        }
    }

    struct MemoryMonitors {
        running: AtomicI64,
        next: AtomicI64,
    }

    impl MemoryMonitors {
        fn new() -> Self {
            Self {
                running: AtomicI64::new(0),
                next: AtomicI64::new(1),
            }
        }
    }

    impl MonitorStore for MemoryMonitors {
        fn resolve_monitor(&self, _time: &TimeBase) -> Result<MonitorId, PipelineError> {
            let current = self.running.load(Ordering::SeqCst);
            if current != 0 {
                return Ok(MonitorId(current));
            }
            let id = self.next.fetch_add(1, Ordering::SeqCst);
            self.running.store(id, Ordering::SeqCst);
            Ok(MonitorId(id))
        }

        fn end_monitor(&self, _monitor: MonitorId, _end: u64) -> Result<(), PipelineError> {
            self.running.store(0, Ordering::SeqCst);
            Ok(())
        }
    }

    fn base() -> TimeBase {
        TimeBase {
            wall_ms: 1_000_000,
            uptime_ms: 0,
        }
    }

    fn schedule(group: MetricGroup) -> SourceSchedule {
        SourceSchedule {
            group,
            period_ms: 0,
            duration_ms: None,
        }
    }

    fn dispatcher(sink: Arc<MemorySink>) -> Dispatcher {
        Dispatcher::new(sink, Arc::new(MemoryMonitors::new()))
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn double_start_is_rejected() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![schedule(MetricGroup::Battery)],
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        assert!(matches!(
            d.start_session_at(&cfg, base()),
            Err(PipelineError::SessionActive)
        ));
    }

    #[test]
    fn stop_without_start_is_rejected() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        assert!(matches!(d.stop_session(), Err(PipelineError::NoSession)));
    }

    #[test]
    fn duplicate_source_fails_fast() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        assert!(matches!(
            d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))),
            Err(PipelineError::DuplicateSource(MetricGroup::Battery))
        ));
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    #[test]
    fn poll_tick_fans_out_to_poll_sources_only() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink.clone());
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        d.add_source(Box::new(ScriptedSource::new(&POLL_B_INFO))).unwrap();
        d.add_source(Box::new(ScriptedSource::new(&SENSOR_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![
                schedule(MetricGroup::Battery),
                schedule(MetricGroup::Memory),
                schedule(MetricGroup::Accelerometer),
            ],
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        d.on_event(&CollectionEvent::poll_tick(100));
        // Two poll sources fired; the sensor source did not.
        assert_eq!(d.buffered_records(), 2);
        let summary = d.stop_session().unwrap();
        let sensor = summary
            .sources
            .iter()
            .find(|s| s.group == MetricGroup::Accelerometer);
        assert!(sensor.is_none());
    }

    #[test]
    fn sensor_event_reaches_group_and_derived_consumer() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        d.add_source(Box::new(ScriptedSource::new(&SENSOR_INFO))).unwrap();
        d.add_source(Box::new(ScriptedSource::new(&DERIVED_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![
                schedule(MetricGroup::Accelerometer),
                schedule(MetricGroup::Orientation),
            ],
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        let event = CollectionEvent::new(
            50,
            EventPayload::Sensor(SensorReading::new(
                MetricGroup::Accelerometer,
                vec![0.0, 0.0, 9.8],
            )),
        );
        d.on_event(&event);
        assert_eq!(d.buffered_records(), 2);
    }

    #[test]
    fn unscheduled_sources_are_not_routed() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        d.add_source(Box::new(ScriptedSource::new(&POLL_B_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![schedule(MetricGroup::Battery)],
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        d.on_event(&CollectionEvent::poll_tick(10));
        assert_eq!(d.buffered_records(), 1);
    }

    #[test]
    fn unsupported_source_is_silently_excluded() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        d.add_source(Box::new(ScriptedSource::unsupported(&POLL_A_INFO)))
            .unwrap();
        let cfg = SessionConfig {
            schedules: vec![schedule(MetricGroup::Battery)],
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        d.on_event(&CollectionEvent::poll_tick(10));
        assert_eq!(d.buffered_records(), 0);
        let summary = d.stop_session().unwrap();
        assert!(summary.sources.is_empty());
    }

    #[test]
    fn duration_cap_expires_routing() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![SourceSchedule {
                group: MetricGroup::Battery,
                period_ms: 0,
                duration_ms: Some(1000),
            }],
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        d.on_event(&CollectionEvent::poll_tick(500));
        d.on_event(&CollectionEvent::poll_tick(1500));
        assert_eq!(d.buffered_records(), 1);
    }

    // -----------------------------------------------------------------------
    // Failure isolation
    // -----------------------------------------------------------------------

    #[test]
    fn panicking_source_does_not_abort_dispatch() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        d.add_source(Box::new(ScriptedSource::panicking(&POLL_A_INFO)))
            .unwrap();
        d.add_source(Box::new(ScriptedSource::new(&POLL_B_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![
                schedule(MetricGroup::Battery),
                schedule(MetricGroup::Memory),
            ],
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        d.on_event(&CollectionEvent::poll_tick(10));
        // Healthy source still produced.
        assert_eq!(d.buffered_records(), 1);
        let summary = d.stop_session().unwrap();
        let bad = summary
            .sources
            .iter()
            .find(|s| s.group == MetricGroup::Battery)
            .unwrap();
        assert_eq!(bad.failures, 1);
        assert_eq!(bad.records_produced, 0);
    }

    // -----------------------------------------------------------------------
    // Batching and stop semantics
    // -----------------------------------------------------------------------

    #[test]
    fn threshold_triggers_async_flush() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink.clone());
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![schedule(MetricGroup::Battery)],
            batch_threshold: 3,
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        for t in 0..4 {
            d.on_event(&CollectionEvent::poll_tick(t));
        }
        // Three records flushed at the threshold, one still live.
        assert_eq!(d.buffered_records(), 1);
        d.stop_session().unwrap();
        assert_eq!(sink.record_count(), 4);
        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        // One threshold batch of 3, one stop flush of 1; arrival order
        // between the async worker and the stop flush is not guaranteed.
        let mut sizes: Vec<usize> = batches.iter().map(|(_, b)| b.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 3]);
    }

    #[test]
    fn stop_flushes_remaining_records() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink.clone());
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![schedule(MetricGroup::Battery)],
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        d.on_event(&CollectionEvent::poll_tick(100));
        d.on_event(&CollectionEvent::poll_tick(1100));
        let summary = d.stop_session().unwrap();
        assert_eq!(sink.record_count(), 2);
        assert!(!d.is_active());
        assert_eq!(summary.sources.len(), 1);
        assert_eq!(summary.sources[0].records_produced, 2);
    }

    #[test]
    fn failed_flush_loses_batch_without_redelivery() {
        let sink = Arc::new(MemorySink::failing());
        let mut d = dispatcher(sink.clone());
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![schedule(MetricGroup::Battery)],
            batch_threshold: 2,
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        d.on_event(&CollectionEvent::poll_tick(0));
        d.on_event(&CollectionEvent::poll_tick(1000));
        // The handoff already removed the batch from the live buffer; the
        // failed flush must not resurrect it.
        assert_eq!(d.buffered_records(), 0);
        d.stop_session().unwrap();
        assert_eq!(sink.record_count(), 0);
    }

    #[test]
    fn events_before_start_are_dropped() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        d.on_event(&CollectionEvent::poll_tick(10));
        assert_eq!(d.buffered_records(), 0);
    }

    #[test]
    fn unregister_runs_for_every_source_on_stop() {
        let sink = Arc::new(MemorySink::default());
        let mut d = dispatcher(sink);
        d.add_source(Box::new(ScriptedSource::new(&POLL_A_INFO))).unwrap();
        d.add_source(Box::new(ScriptedSource::new(&POLL_B_INFO))).unwrap();
        let cfg = SessionConfig {
            schedules: vec![
                schedule(MetricGroup::Battery),
                schedule(MetricGroup::Memory),
            ],
            ..Default::default()
        };
        d.start_session_at(&cfg, base()).unwrap();
        for status in d.source_statuses() {
            assert!(status.registered);
        }
        d.stop_session().unwrap();
        for status in d.source_statuses() {
            assert!(!status.registered);
        }
    }
}
