//! # cimon-core
//!
//! **The metric-collection and batching pipeline.**
//!
//! `cimon-core` turns dozens of heterogeneous device inputs — periodic
//! polls, sensor callbacks, system broadcasts, content-provider change
//! notifications — into a single stream of timestamped metric records,
//! throttled per source, batched off the delivery path, and flushed
//! transactionally to a persistent sink.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cimon_core::{CollectionEvent, Dispatcher, SessionConfig, SourceSchedule};
//! use cimon_core::record::MetricGroup;
//! # use cimon_core::batch::RecordSink;
//! # use cimon_core::monitor::MonitorStore;
//! # fn open_store() -> Arc<dyn RecordSink> { unimplemented!() }
//! # fn open_monitors() -> Arc<dyn MonitorStore> { unimplemented!() }
//!
//! let mut dispatcher = Dispatcher::new(open_store(), open_monitors());
//! for source in cimon_core::sources::platform_sources() {
//!     dispatcher.add_source(source).expect("duplicate source group");
//! }
//!
//! let config = SessionConfig {
//!     schedules: vec![SourceSchedule {
//!         group: MetricGroup::Battery,
//!         period_ms: 60_000,
//!         duration_ms: None,
//!     }],
//!     ..Default::default()
//! };
//! dispatcher.start_session(&config).unwrap();
//! dispatcher.on_event(&CollectionEvent::poll_tick(cimon_core::time::uptime_ms()));
//! let summary = dispatcher.stop_session().unwrap();
//! println!("monitor {} collected from {} sources", summary.monitor, summary.sources.len());
//! ```
//!
//! ## Architecture
//!
//! Sources → Dispatcher (route + throttle) → Batch buffer → Batch writer → sink
//!
//! - Event delivery is single-threaded and free of I/O; persistence runs on
//!   short-lived worker threads handed whole batches.
//! - Each group has exactly one live source, enforced at registry insertion.
//! - Timestamps are monotonic uptime throughout; the per-monitor wall-clock
//!   offset converts them at read time.

pub mod batch;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod monitor;
pub mod record;
pub mod registry;
pub mod source;
pub mod sources;
pub mod time;

pub use batch::{BatchBuffer, BatchWriter, RecordSink};
pub use dispatcher::{
    DEFAULT_BATCH_THRESHOLD, Dispatcher, SessionConfig, SessionSummary, SourceSchedule,
    SourceSessionStats, SourceStatus,
};
pub use error::PipelineError;
pub use event::{
    BroadcastSignal, CollectionEvent, ContentChange, DeliveryMode, EventPayload, LocationFix,
    RegisterParams, SensorReading,
};
pub use monitor::{MonitorId, MonitorStore, TimeBase};
pub use record::{GROUP_BLOCK_WIDTH, MetricGroup, MetricRecord, MetricValue};
pub use registry::{SourceRegistry, SourceRuntime};
pub use source::{DataSource, SourceInfo, SourceKind, SourceTiming, SubMetricInfo};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
