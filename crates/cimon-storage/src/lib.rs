//! # cimon-storage
//!
//! SQLite persistence for the collection pipeline: transactional batch
//! inserts, schema metadata, monitor rows with wall-clock offsets, and the
//! bounded upload window the uploader consumes.
//!
//! [`MetricStore`] implements `cimon_core`'s [`RecordSink`] and
//! [`MonitorStore`] seams, so the pipeline never touches SQLite directly.
//!
//! [`RecordSink`]: cimon_core::batch::RecordSink
//! [`MonitorStore`]: cimon_core::monitor::MonitorStore

pub mod error;
pub mod store;

pub use error::{Result, StorageError};
pub use store::{MetricStore, UploadRow};
