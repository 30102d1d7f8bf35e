//! Span ingestion and persistence.
//!
//! # Data Flow
//! ```text
//! tracer ends span
//!     → ingest() (stamp collected_at, counters, buffer push — never blocks)
//!     → flush task (timer tick or batch-size nudge)
//!     → store.rs (one batch append per flush)
//!
//! Readers (analyzer, admin API):
//!     query()/search() merge the in-memory buffer with stored records
//! ```
//!
//! # Design Decisions
//! - Many producers, one consumer: a lock-guarded buffer drained by a
//!   single timer-driven flush task
//! - A failed flush re-queues the batch and flips a degraded flag; the
//!   collector keeps ingesting from memory until storage recovers
//! - Eviction is flush-then-evict: the oldest unflushed records are only
//!   dropped once the buffer is past its hard cap

pub mod store;

pub use store::{FileStore, StoreError};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::{DashMap, DashSet};
use futures_util::Stream;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

use crate::config::CollectorConfig;
use crate::observability::metrics;
use crate::span::{AttrValue, OperationCategory, Span, SpanRecord, SpanStatus};

/// Default `limit` applied when a query does not set one.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Records scanned per search before the text match is applied.
const SEARCH_SCAN_LIMIT: usize = 10_000;

/// Error type for collector read paths.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
}

/// AND-combined span filters. Absent fields are unconstrained.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    pub trace_id: Option<Uuid>,
    pub service_name: Option<String>,
    pub operation_category: Option<OperationCategory>,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub limit: usize,
}

impl QueryFilter {
    /// Filter covering the last `hours`, unconstrained otherwise.
    pub fn last_hours(hours: u32) -> Self {
        let until = Utc::now();
        Self {
            trace_id: None,
            service_name: None,
            operation_category: None,
            since: until - Duration::hours(i64::from(hours)),
            until,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }

    pub fn matches(&self, record: &SpanRecord) -> bool {
        if record.collected_at < self.since || record.collected_at > self.until {
            return false;
        }
        if let Some(trace_id) = self.trace_id {
            if record.span.trace_id != trace_id {
                return false;
            }
        }
        if let Some(service) = &self.service_name {
            if record.span.service_name != *service {
                return false;
            }
        }
        if let Some(category) = self.operation_category {
            if record.span.operation_category != category {
                return false;
            }
        }
        true
    }
}

/// Point-in-time collector counters.
///
/// Field names are part of the dashboard contract; `memory_traces_count`
/// counts records currently buffered in memory. `total_traces` and
/// `error_traces` are monotonic counts of distinct trace ids; a trace that
/// goes quiet past the quiescence window and later resumes counts again.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStats {
    pub total_traces: u64,
    pub total_spans: u64,
    pub memory_traces_count: u64,
    pub error_traces: u64,
    pub dropped_spans: u64,
    pub degraded: bool,
}

/// Ingestion/persistence component for completed spans.
///
/// Explicitly constructed with its configuration and storage; owned by the
/// server lifecycle, not a process-wide singleton.
pub struct Collector {
    config: CollectorConfig,
    store: FileStore,
    buffer: Mutex<VecDeque<SpanRecord>>,
    flush_nudge: Notify,
    degraded: AtomicBool,
    total_spans: AtomicU64,
    dropped_spans: AtomicU64,
    total_traces: AtomicU64,
    error_trace_count: AtomicU64,
    /// Last-seen time per in-flight trace id, for the advisory quiescence
    /// heuristic. Pruned once a trace goes quiet so the maps stay bounded
    /// by the number of active traces, not the lifetime total.
    traces: DashMap<Uuid, DateTime<Utc>>,
    error_traces: DashSet<Uuid>,
}

impl Collector {
    pub fn new(config: CollectorConfig, store: FileStore) -> Self {
        Self {
            config,
            store,
            buffer: Mutex::new(VecDeque::new()),
            flush_nudge: Notify::new(),
            degraded: AtomicBool::new(false),
            total_spans: AtomicU64::new(0),
            dropped_spans: AtomicU64::new(0),
            total_traces: AtomicU64::new(0),
            error_trace_count: AtomicU64::new(0),
            traces: DashMap::new(),
            error_traces: DashSet::new(),
        }
    }

    /// Accept a completed span. Synchronous and non-blocking: the record is
    /// buffered and the flush task is nudged when a batch is ready.
    pub fn ingest(&self, span: Span) {
        let collected_at = Utc::now();
        self.total_spans.fetch_add(1, Ordering::Relaxed);
        if self.traces.insert(span.trace_id, collected_at).is_none() {
            self.total_traces.fetch_add(1, Ordering::Relaxed);
        }
        if span.status == SpanStatus::Error && self.error_traces.insert(span.trace_id) {
            self.error_trace_count.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_span_ingested();

        let record = SpanRecord { span, collected_at };
        let (len, dropped) = {
            let mut buffer = self.lock_buffer();
            buffer.push_back(record);
            let dropped = Self::evict_over_cap(&mut buffer, self.config.max_memory_traces);
            (buffer.len(), dropped)
        };

        if dropped > 0 {
            self.dropped_spans.fetch_add(dropped, Ordering::Relaxed);
            metrics::record_spans_dropped(dropped);
            tracing::warn!(dropped, "ingestion outpaced flushing; evicted oldest records");
        }
        if len >= self.config.batch_size {
            self.flush_nudge.notify_one();
        }
    }

    /// Run the flush loop until shutdown. The final flush on shutdown means
    /// a clean exit loses nothing that was buffered.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            flush_interval_secs = self.config.flush_interval_secs,
            batch_size = self.config.batch_size,
            "collector flush task starting"
        );
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.config.flush_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_once().await;
                    self.prune_quiescent_traces();
                }
                _ = self.flush_nudge.notified() => {
                    self.flush_once().await;
                }
                _ = shutdown.recv() => {
                    let flushed = self.flush_once().await;
                    tracing::info!(flushed, "collector flush task stopping");
                    break;
                }
            }
        }
    }

    /// Drain the buffer and write it as one batch. Returns the number of
    /// records persisted; on failure the batch is re-queued in order and
    /// retried on the next tick.
    pub async fn flush_once(&self) -> usize {
        let batch: Vec<SpanRecord> = {
            let mut buffer = self.lock_buffer();
            if buffer.is_empty() {
                return 0;
            }
            buffer.drain(..).collect()
        };

        let started = Instant::now();
        match self.store.append_batch(&batch).await {
            Ok(()) => {
                let count = batch.len();
                if self.degraded.swap(false, Ordering::Relaxed) {
                    tracing::info!("span storage recovered; leaving memory-only mode");
                }
                metrics::record_flush(count as u64, started);
                tracing::debug!(count, "flushed span batch");
                count
            }
            Err(e) => {
                self.degraded.store(true, Ordering::Relaxed);
                metrics::record_flush_failure();
                tracing::warn!(error = %e, count = batch.len(), "flush failed; keeping batch in memory");
                let dropped = {
                    let mut buffer = self.lock_buffer();
                    for record in batch.into_iter().rev() {
                        buffer.push_front(record);
                    }
                    Self::evict_over_cap(&mut buffer, self.config.max_memory_traces)
                };
                if dropped > 0 {
                    self.dropped_spans.fetch_add(dropped, Ordering::Relaxed);
                    metrics::record_spans_dropped(dropped);
                }
                0
            }
        }
    }

    /// Filtered read over memory + storage, newest first.
    ///
    /// A storage error is only surfaced when the collector is not in
    /// memory-only mode; while degraded, everything ingested since the
    /// last successful flush is still in memory and is served from there.
    pub async fn query(&self, filter: &QueryFilter) -> Result<Vec<SpanRecord>, CollectorError> {
        let mut results: Vec<SpanRecord> = {
            let buffer = self.lock_buffer();
            buffer.iter().filter(|r| filter.matches(r)).cloned().collect()
        };

        match self.store.query(filter).await {
            Ok(stored) => results.extend(stored),
            Err(e) if self.is_degraded() => {
                tracing::warn!(error = %e, "storage read failed; serving memory-only results");
            }
            Err(e) => return Err(e.into()),
        }

        // A record can appear in both the memory snapshot and a flush that
        // completed between the two reads.
        let mut seen = HashSet::with_capacity(results.len());
        results.retain(|r| seen.insert(r.span.span_id));
        results.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        results.truncate(filter.limit);
        Ok(results)
    }

    /// Case-insensitive substring search over operation names, error
    /// messages, and string attribute values.
    pub async fn search(
        &self,
        text: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<SpanRecord>, CollectorError> {
        let mut scan = filter.clone();
        scan.limit = SEARCH_SCAN_LIMIT;
        let needle = text.to_lowercase();

        let mut results = self.query(&scan).await?;
        results.retain(|r| matches_text(r, &needle));
        results.truncate(filter.limit);
        Ok(results)
    }

    /// Lazy export stream for offline analysis. Flushes first so the
    /// export covers everything ingested up to this call; day files are
    /// only read as the consumer pulls, so a dropped consumer stops
    /// further IO.
    pub async fn export(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<impl Stream<Item = std::io::Result<bytes::Bytes>> + Send + 'static, CollectorError>
    {
        self.flush_once().await;
        Ok(self.store.export(from, to).await?)
    }

    /// Irreversibly delete records older than the cutoff, in storage and
    /// in memory. Returns the number removed.
    pub async fn cleanup(&self, older_than_days: u32) -> Result<u64, CollectorError> {
        let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
        let mut removed = self.store.cleanup(cutoff).await?;
        {
            let mut buffer = self.lock_buffer();
            let before = buffer.len();
            buffer.retain(|r| r.collected_at >= cutoff);
            removed += (before - buffer.len()) as u64;
        }
        tracing::info!(older_than_days, removed, "cleanup completed");
        Ok(removed)
    }

    pub fn stats(&self) -> CollectorStats {
        CollectorStats {
            total_traces: self.total_traces.load(Ordering::Relaxed),
            total_spans: self.total_spans.load(Ordering::Relaxed),
            memory_traces_count: self.lock_buffer().len() as u64,
            error_traces: self.error_trace_count.load(Ordering::Relaxed),
            dropped_spans: self.dropped_spans.load(Ordering::Relaxed),
            degraded: self.is_degraded(),
        }
    }

    /// Advisory completeness: true once no span for the trace has arrived
    /// within the quiescence window. Traces without a bookkeeping entry
    /// (never seen, or pruned after going quiet) report complete.
    pub fn trace_complete(&self, trace_id: &Uuid) -> bool {
        let quiescence = Duration::seconds(self.config.quiescence_secs as i64);
        self.traces
            .get(trace_id)
            .map(|last_seen| Utc::now() - *last_seen >= quiescence)
            .unwrap_or(true)
    }

    /// Drop per-trace bookkeeping for traces quiet past the quiescence
    /// window. The monotonic counters keep their totals.
    fn prune_quiescent_traces(&self) {
        let cutoff = Utc::now() - Duration::seconds(self.config.quiescence_secs as i64);
        self.traces.retain(|id, last_seen| {
            if *last_seen >= cutoff {
                return true;
            }
            self.error_traces.remove(id);
            false
        });
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn evict_over_cap(buffer: &mut VecDeque<SpanRecord>, cap: usize) -> u64 {
        let mut dropped = 0;
        while buffer.len() > cap {
            buffer.pop_front();
            dropped += 1;
        }
        dropped
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<SpanRecord>> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn matches_text(record: &SpanRecord, needle: &str) -> bool {
    if record.span.operation_name.to_lowercase().contains(needle) {
        return true;
    }
    if let Some(error) = &record.span.error_info {
        if error.message.to_lowercase().contains(needle)
            || error.error_type.to_lowercase().contains(needle)
        {
            return true;
        }
    }
    record.span.attributes.values().any(|v| match v {
        AttrValue::String(s) => s.to_lowercase().contains(needle),
        _ => false,
    })
}
