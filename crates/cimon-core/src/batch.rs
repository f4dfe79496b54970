//! Batch buffer and writer: accumulate records off the sampling path and
//! persist them transactionally on worker threads.
//!
//! The buffer is the one structure touched by both the event-delivery
//! thread (appends) and the flush machinery (swap). The handoff is a single
//! O(1) swap under the lock — producers wait for the swap, never for the
//! flush itself.

use std::mem;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::PipelineError;
use crate::monitor::MonitorId;
use crate::record::MetricRecord;

/// Persistent destination for finalized batches.
///
/// One `write_batch` call is one all-or-nothing transaction: either every
/// record in the batch becomes durably visible, or none do. Implementations
/// must preserve the given record order within the batch.
pub trait RecordSink: Send + Sync {
    fn write_batch(&self, monitor: MonitorId, records: &[MetricRecord]) -> Result<(), PipelineError>;
}

/// Capacity-bounded accumulation buffer for produced records.
pub struct BatchBuffer {
    records: Mutex<Vec<MetricRecord>>,
    threshold: usize,
}

impl BatchBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            records: Mutex::new(Vec::with_capacity(threshold)),
            threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: usize) {
        self.threshold = threshold;
    }

    /// Append records; when the buffer reaches the threshold, swap it out
    /// and return the full batch for flushing.
    pub fn push_all(&self, records: Vec<MetricRecord>) -> Option<Vec<MetricRecord>> {
        if records.is_empty() {
            return None;
        }
        let mut buf = self.records.lock().unwrap();
        buf.extend(records);
        if buf.len() >= self.threshold {
            Some(mem::replace(&mut *buf, Vec::with_capacity(self.threshold)))
        } else {
            None
        }
    }

    /// Take whatever is buffered, regardless of the threshold.
    pub fn drain(&self) -> Vec<MetricRecord> {
        mem::take(&mut *self.records.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flushes finalized batches to the sink on short-lived worker threads.
///
/// A failed flush is logged and the batch abandoned — accepted loss, the
/// pipeline keeps running. Cross-batch ordering between concurrently queued
/// flushes is not guaranteed; order within a batch is.
pub struct BatchWriter {
    sink: Arc<dyn RecordSink>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl BatchWriter {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self {
            sink,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Hand a batch to a worker thread and return immediately.
    pub fn flush_async(&self, monitor: MonitorId, batch: Vec<MetricRecord>) {
        if batch.is_empty() {
            return;
        }
        let sink = Arc::clone(&self.sink);
        let handle = std::thread::spawn(move || write_one(&*sink, monitor, &batch));
        let mut workers = self.workers.lock().unwrap();
        workers.retain(|h| !h.is_finished());
        workers.push(handle);
    }

    /// Flush a batch on a worker thread and wait for it to finish.
    ///
    /// Used at session stop: the teardown sequence waits for durability,
    /// but the write still happens off the event-delivery thread.
    pub fn flush_blocking(&self, monitor: MonitorId, batch: Vec<MetricRecord>) {
        if batch.is_empty() {
            return;
        }
        let sink = Arc::clone(&self.sink);
        let handle = std::thread::spawn(move || write_one(&*sink, monitor, &batch));
        if handle.join().is_err() {
            log::error!("flush worker panicked; batch abandoned");
        }
    }

    /// Wait for every outstanding asynchronous flush.
    pub fn join_all(&self) {
        let workers = mem::take(&mut *self.workers.lock().unwrap());
        for handle in workers {
            if handle.join().is_err() {
                log::error!("flush worker panicked; batch abandoned");
            }
        }
    }
}

fn write_one(sink: &dyn RecordSink, monitor: MonitorId, batch: &[MetricRecord]) {
    if let Err(e) = sink.write_batch(monitor, batch) {
        log::error!("batch of {} records abandoned: {e}", batch.len());
    }
}
