//! SQLite-backed metric store.
//!
//! Owns the one database handle in the process and implements the core
//! pipeline's sink and monitor-registry seams. Batch writes are a single
//! transaction with a cached insert statement; any row failure rolls the
//! whole batch back — batches are atomically visible or absent, never
//! partial.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;

use cimon_core::batch::RecordSink;
use cimon_core::error::PipelineError;
use cimon_core::monitor::{MonitorId, MonitorStore, TimeBase};
use cimon_core::record::{MetricRecord, MetricValue};
use cimon_core::source::SourceInfo;

use crate::error::{Result, StorageError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS monitors (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    offset_ms       INTEGER NOT NULL,
    started_wall_ms INTEGER NOT NULL,
    end_uptime_ms   INTEGER NOT NULL DEFAULT 0,
    running         INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS records (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    monitor_id INTEGER NOT NULL,
    metric_id  INTEGER NOT NULL,
    uptime_ms  INTEGER NOT NULL CHECK (uptime_ms >= 0),
    value_kind INTEGER NOT NULL,
    value
);
CREATE INDEX IF NOT EXISTS idx_records_monitor ON records(monitor_id);

CREATE TABLE IF NOT EXISTS metric_groups (
    group_id      INTEGER PRIMARY KEY,
    name          TEXT NOT NULL,
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    kind          TEXT NOT NULL,
    supported     INTEGER NOT NULL,
    power_ma      REAL NOT NULL,
    min_period_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS metric_meta (
    metric_id  INTEGER PRIMARY KEY,
    group_id   INTEGER NOT NULL,
    name       TEXT NOT NULL,
    units      TEXT NOT NULL,
    max_range  REAL NOT NULL,
    resolution REAL NOT NULL
);
";

/// One committed record selected for upload, with its wall-clock timestamp
/// reconstructed from the monitor offset.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRow {
    pub row_id: i64,
    pub monitor_id: i64,
    pub metric_id: u32,
    pub uptime_ms: u64,
    pub wall_ms: i64,
    pub value: MetricValue,
}

/// The process-wide storage handle.
///
/// Constructed once and shared by reference into the dispatcher and the
/// uploader; there is no ambient global database state.
pub struct MetricStore {
    conn: Mutex<Connection>,
}

impl MetricStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn write_batch_tx(&self, monitor: MonitorId, records: &[MetricRecord]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO records (monitor_id, metric_id, uptime_ms, value_kind, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                stmt.execute(rusqlite::params![
                    monitor.0,
                    record.metric_id,
                    record.uptime_ms as i64,
                    record.value.kind(),
                    stored_value(&record.value),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Upsert the declared schema of one source group.
    ///
    /// Invoked once per app-version bump, not on the sampling path.
    pub fn upsert_schema(&self, info: &SourceInfo, supported: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO metric_groups
             (group_id, name, title, description, kind, supported, power_ma, min_period_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                info.group.base_id(),
                info.group.name(),
                info.title,
                info.description,
                info.kind.to_string(),
                supported,
                info.power_ma,
                info.min_period_ms,
            ],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO metric_meta
                 (metric_id, group_id, name, units, max_range, resolution)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (offset, sub) in info.metrics.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    info.group.metric_id(offset as u32),
                    info.group.base_id(),
                    sub.name,
                    sub.units,
                    sub.max_range,
                    sub.resolution,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn resolve_monitor_row(&self, time: &TimeBase) -> Result<MonitorId> {
        let conn = self.conn.lock().unwrap();
        let running: Option<i64> = conn
            .query_row(
                "SELECT id FROM monitors WHERE running = 1 ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        if let Some(id) = running {
            return Ok(MonitorId(id));
        }
        conn.execute(
            "INSERT INTO monitors (offset_ms, started_wall_ms) VALUES (?1, ?2)",
            rusqlite::params![time.offset_ms(), time.wall_ms],
        )?;
        Ok(MonitorId(conn.last_insert_rowid()))
    }

    fn end_monitor_row(&self, monitor: MonitorId, end_uptime_ms: u64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE monitors SET running = 0, end_uptime_ms = ?1 WHERE id = ?2",
            rusqlite::params![end_uptime_ms as i64, monitor.0],
        )?;
        Ok(())
    }

    /// Oldest committed rows, up to `limit`, with wall-clock timestamps.
    pub fn fetch_upload_window(&self, limit: usize) -> Result<Vec<UploadRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT r.id, r.monitor_id, r.metric_id, r.uptime_ms, r.value_kind, r.value,
                    m.offset_ms
             FROM records r JOIN monitors m ON m.id = r.monitor_id
             ORDER BY r.id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            let row_id: i64 = row.get(0)?;
            let monitor_id: i64 = row.get(1)?;
            let metric_id: u32 = row.get(2)?;
            let uptime_ms: i64 = row.get(3)?;
            let kind: i64 = row.get(4)?;
            let value: SqlValue = row.get(5)?;
            let offset_ms: i64 = row.get(6)?;
            Ok((row_id, monitor_id, metric_id, uptime_ms, kind, value, offset_ms))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (row_id, monitor_id, metric_id, uptime_ms, kind, value, offset_ms) = row?;
            out.push(UploadRow {
                row_id,
                monitor_id,
                metric_id,
                uptime_ms: uptime_ms as u64,
                wall_ms: uptime_ms + offset_ms,
                value: loaded_value(row_id, kind, value)?,
            });
        }
        Ok(out)
    }

    /// Delete acknowledged rows by id.
    ///
    /// An empty list is a no-op — never an error, never an indexing hazard.
    pub fn delete_rows(&self, row_ids: &[i64]) -> Result<usize> {
        if row_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; row_ids.len()].join(",");
        let sql = format!("DELETE FROM records WHERE id IN ({placeholders})");
        let deleted = conn.execute(&sql, rusqlite::params_from_iter(row_ids.iter()))?;
        Ok(deleted)
    }

    /// Total stored records (diagnostics and tests).
    pub fn record_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?)
    }
}

/// Stored representation of a metric value (dynamic-typed `value` column).
fn stored_value(value: &MetricValue) -> SqlValue {
    match value {
        MetricValue::I8(v) => SqlValue::Integer(i64::from(*v)),
        MetricValue::I32(v) => SqlValue::Integer(i64::from(*v)),
        MetricValue::I64(v) => SqlValue::Integer(*v),
        MetricValue::F32(v) => SqlValue::Real(f64::from(*v)),
        MetricValue::F64(v) => SqlValue::Real(*v),
        MetricValue::Text(v) => SqlValue::Text(v.clone()),
    }
}

/// Reverse of [`stored_value`], keyed by the kind tag.
fn loaded_value(row_id: i64, kind: i64, value: SqlValue) -> Result<MetricValue> {
    match (kind, value) {
        (0, SqlValue::Integer(v)) => Ok(MetricValue::I8(v as i8)),
        (1, SqlValue::Integer(v)) => Ok(MetricValue::I32(v as i32)),
        (2, SqlValue::Integer(v)) => Ok(MetricValue::I64(v)),
        (3, SqlValue::Real(v)) => Ok(MetricValue::F32(v as f32)),
        (4, SqlValue::Real(v)) => Ok(MetricValue::F64(v)),
        (5, SqlValue::Text(v)) => Ok(MetricValue::Text(v)),
        (kind, _) => Err(StorageError::UnexpectedValueKind { row_id, kind }),
    }
}

impl RecordSink for MetricStore {
    fn write_batch(
        &self,
        monitor: MonitorId,
        records: &[MetricRecord],
    ) -> std::result::Result<(), PipelineError> {
        self.write_batch_tx(monitor, records)
            .map_err(|e| PipelineError::Sink(e.to_string()))
    }
}

impl MonitorStore for MetricStore {
    fn resolve_monitor(&self, time: &TimeBase) -> std::result::Result<MonitorId, PipelineError> {
        self.resolve_monitor_row(time)
            .map_err(|e| PipelineError::Sink(e.to_string()))
    }

    fn end_monitor(
        &self,
        monitor: MonitorId,
        end_uptime_ms: u64,
    ) -> std::result::Result<(), PipelineError> {
        self.end_monitor_row(monitor, end_uptime_ms)
            .map_err(|e| PipelineError::Sink(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cimon_core::record::MetricGroup;

    fn time_base() -> TimeBase {
        TimeBase {
            wall_ms: 1_700_000_100_000,
            uptime_ms: 100_000,
        }
    }

    fn rec(metric_id: u32, uptime_ms: u64, value: MetricValue) -> MetricRecord {
        MetricRecord::new(metric_id, uptime_ms, value)
    }

    fn store_with_monitor() -> (MetricStore, MonitorId) {
        let store = MetricStore::open_in_memory().unwrap();
        let monitor = store.resolve_monitor_row(&time_base()).unwrap();
        (store, monitor)
    }

    // -----------------------------------------------------------------------
    // Value round-trip
    // -----------------------------------------------------------------------

    #[test]
    fn every_value_kind_round_trips() {
        let (store, monitor) = store_with_monitor();
        let values = vec![
            MetricValue::I8(-7),
            MetricValue::I32(123_456),
            MetricValue::I64(-9_000_000_000),
            MetricValue::F32(2.5),
            MetricValue::F64(-0.001),
            MetricValue::Text("Charging".into()),
        ];
        let records: Vec<MetricRecord> = values
            .iter()
            .enumerate()
            .map(|(i, v)| rec(i as u32, 1_000 + i as u64, v.clone()))
            .collect();
        store.write_batch_tx(monitor, &records).unwrap();

        let rows = store.fetch_upload_window(100).unwrap();
        assert_eq!(rows.len(), values.len());
        for (row, value) in rows.iter().zip(&values) {
            assert_eq!(&row.value, value);
        }
    }

    #[test]
    fn wall_clock_is_uptime_plus_offset() {
        let (store, monitor) = store_with_monitor();
        store
            .write_batch_tx(monitor, &[rec(1, 150_000, MetricValue::I64(1))])
            .unwrap();
        let rows = store.fetch_upload_window(10).unwrap();
        // offset = wall − uptime at monitor creation = 1_700_000_000_000.
        assert_eq!(rows[0].wall_ms, 1_700_000_150_000);
        assert_eq!(rows[0].uptime_ms, 150_000);
    }

    // -----------------------------------------------------------------------
    // Batch atomicity
    // -----------------------------------------------------------------------

    #[test]
    fn failing_row_rolls_back_the_whole_batch() {
        let (store, monitor) = store_with_monitor();
        let mut records: Vec<MetricRecord> = (0..50)
            .map(|i| rec(1, 1_000 + i, MetricValue::I64(i as i64)))
            .collect();
        // Row 37 violates the uptime CHECK once cast to i64.
        records[36].uptime_ms = u64::MAX;

        assert!(store.write_batch_tx(monitor, &records).is_err());
        assert_eq!(store.record_count().unwrap(), 0);
    }

    #[test]
    fn successful_batch_is_fully_visible() {
        let (store, monitor) = store_with_monitor();
        let records: Vec<MetricRecord> = (0..50)
            .map(|i| rec(1, 1_000 + i, MetricValue::I64(i as i64)))
            .collect();
        store.write_batch_tx(monitor, &records).unwrap();
        assert_eq!(store.record_count().unwrap(), 50);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let (store, monitor) = store_with_monitor();
        let records: Vec<MetricRecord> = [5u64, 3, 9, 1]
            .iter()
            .map(|&ts| rec(1, ts, MetricValue::I64(ts as i64)))
            .collect();
        store.write_batch_tx(monitor, &records).unwrap();
        let rows = store.fetch_upload_window(10).unwrap();
        let stamps: Vec<u64> = rows.iter().map(|r| r.uptime_ms).collect();
        assert_eq!(stamps, vec![5, 3, 9, 1]);
    }

    // -----------------------------------------------------------------------
    // Monitor lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn running_monitor_is_resumed() {
        let store = MetricStore::open_in_memory().unwrap();
        let first = store.resolve_monitor_row(&time_base()).unwrap();
        let second = store.resolve_monitor_row(&time_base()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ended_monitor_is_not_resumed() {
        let store = MetricStore::open_in_memory().unwrap();
        let first = store.resolve_monitor_row(&time_base()).unwrap();
        store.end_monitor_row(first, 200_000).unwrap();
        let second = store.resolve_monitor_row(&time_base()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn monitor_survives_process_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cimon.db");
        let first = {
            let store = MetricStore::open(&path).unwrap();
            store.resolve_monitor_row(&time_base()).unwrap()
        };
        let store = MetricStore::open(&path).unwrap();
        let second = store.resolve_monitor_row(&time_base()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ending_a_monitor_keeps_its_records() {
        let (store, monitor) = store_with_monitor();
        store
            .write_batch_tx(monitor, &[rec(1, 1, MetricValue::I64(1))])
            .unwrap();
        store.end_monitor_row(monitor, 2).unwrap();
        assert_eq!(store.record_count().unwrap(), 1);
    }

    // -----------------------------------------------------------------------
    // Upload window
    // -----------------------------------------------------------------------

    #[test]
    fn window_is_bounded_and_oldest_first() {
        let (store, monitor) = store_with_monitor();
        let records: Vec<MetricRecord> = (0..10)
            .map(|i| rec(1, i, MetricValue::I64(i as i64)))
            .collect();
        store.write_batch_tx(monitor, &records).unwrap();
        let rows = store.fetch_upload_window(4).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.windows(2).all(|w| w[0].row_id < w[1].row_id));
    }

    #[test]
    fn delete_rows_empty_list_is_a_no_op() {
        let (store, monitor) = store_with_monitor();
        store
            .write_batch_tx(monitor, &[rec(1, 1, MetricValue::I64(1))])
            .unwrap();
        assert_eq!(store.delete_rows(&[]).unwrap(), 0);
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn delete_rows_removes_exactly_the_given_ids() {
        let (store, monitor) = store_with_monitor();
        let records: Vec<MetricRecord> = (0..5)
            .map(|i| rec(1, i, MetricValue::I64(i as i64)))
            .collect();
        store.write_batch_tx(monitor, &records).unwrap();
        let rows = store.fetch_upload_window(3).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.row_id).collect();
        assert_eq!(store.delete_rows(&ids).unwrap(), 3);
        assert_eq!(store.record_count().unwrap(), 2);
    }

    // -----------------------------------------------------------------------
    // Schema metadata
    // -----------------------------------------------------------------------

    #[test]
    fn schema_upsert_is_idempotent() {
        let store = MetricStore::open_in_memory().unwrap();
        let sources = cimon_core::sources::platform_sources();
        let info = sources[0].info();
        store.upsert_schema(info, true).unwrap();
        store.upsert_schema(info, false).unwrap();

        let conn = store.conn.lock().unwrap();
        let groups: i64 = conn
            .query_row("SELECT COUNT(*) FROM metric_groups", [], |r| r.get(0))
            .unwrap();
        assert_eq!(groups, 1);
        let supported: bool = conn
            .query_row(
                "SELECT supported FROM metric_groups WHERE group_id = ?1",
                [info.group.base_id()],
                |r| r.get(0),
            )
            .unwrap();
        assert!(!supported);
        let subs: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM metric_meta WHERE group_id = ?1",
                [info.group.base_id()],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(subs, info.metrics.len() as i64);
    }

    #[test]
    fn group_name_is_stored_for_display() {
        let store = MetricStore::open_in_memory().unwrap();
        let sources = cimon_core::sources::platform_sources();
        for source in &sources {
            store.upsert_schema(source.info(), true).unwrap();
        }
        let conn = store.conn.lock().unwrap();
        let name: String = conn
            .query_row(
                "SELECT name FROM metric_groups WHERE group_id = ?1",
                [MetricGroup::Battery.base_id()],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(name, "battery");
    }
}
