//! # cimon-upload
//!
//! Pushes committed metric rows to the collection server.
//!
//! One `run_once` call selects a bounded window of the oldest committed
//! rows, POSTs them as JSON, and deletes exactly the acknowledged rows on
//! success. Rows stay in place on any failure, so the next window retries
//! them; the store's transactional commit guarantees a row is never
//! uploaded before it is durably visible.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use cimon_core::record::MetricValue;
use cimon_storage::{MetricStore, StorageError, UploadRow};

/// Default number of rows per upload window.
pub const DEFAULT_WINDOW: usize = 1_000;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload: HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upload: {0}")]
    Storage(#[from] StorageError),

    /// The server answered with a non-success status; nothing was deleted.
    #[error("upload: server rejected batch with status {status}")]
    Rejected { status: u16 },
}

/// Uploader configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Collection-server endpoint receiving the JSON batches.
    pub endpoint: String,
    /// Identifier of this device, echoed in every payload.
    pub device_id: String,
    /// Maximum rows per window.
    pub window: usize,
}

#[derive(Serialize)]
struct UploadPayload<'a> {
    device_id: &'a str,
    rows: Vec<PayloadRow>,
}

#[derive(Serialize)]
struct PayloadRow {
    id: i64,
    monitor: i64,
    metric: u32,
    uptime_ms: u64,
    wall_ms: i64,
    value: serde_json::Value,
}

/// JSON representation of a metric value: numbers stay numbers, text stays
/// a string.
fn value_json(value: &MetricValue) -> serde_json::Value {
    match value {
        MetricValue::I8(v) => serde_json::json!(v),
        MetricValue::I32(v) => serde_json::json!(v),
        MetricValue::I64(v) => serde_json::json!(v),
        MetricValue::F32(v) => serde_json::json!(v),
        MetricValue::F64(v) => serde_json::json!(v),
        MetricValue::Text(v) => serde_json::json!(v),
    }
}

fn build_payload<'a>(device_id: &'a str, rows: &[UploadRow]) -> UploadPayload<'a> {
    UploadPayload {
        device_id,
        rows: rows
            .iter()
            .map(|row| PayloadRow {
                id: row.row_id,
                monitor: row.monitor_id,
                metric: row.metric_id,
                uptime_ms: row.uptime_ms,
                wall_ms: row.wall_ms,
                value: value_json(&row.value),
            })
            .collect(),
    }
}

/// Blocking uploader over the shared store handle.
pub struct Uploader {
    store: Arc<MetricStore>,
    client: reqwest::blocking::Client,
    config: UploadConfig,
}

impl Uploader {
    pub fn new(store: Arc<MetricStore>, config: UploadConfig) -> Result<Self, UploadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            store,
            client,
            config,
        })
    }

    /// Upload one window. Returns the number of rows acknowledged and
    /// removed; zero when there was nothing to send.
    pub fn run_once(&self) -> Result<usize, UploadError> {
        let rows = self.store.fetch_upload_window(self.config.window)?;
        if rows.is_empty() {
            log::debug!("upload window empty; nothing to send");
            return Ok(0);
        }

        let payload = build_payload(&self.config.device_id, &rows);
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
            });
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.row_id).collect();
        let deleted = self.store.delete_rows(&ids)?;
        log::info!("uploaded and removed {deleted} rows");
        Ok(deleted)
    }
}
