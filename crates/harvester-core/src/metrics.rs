//! Engine metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Engine metrics.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Extraction requests received by the change scheduler.
    pub requests: AtomicU64,

    /// Requests absorbed into an already scheduled frame.
    pub coalesced_requests: AtomicU64,

    /// Scheduled frames that actually ran.
    pub frames_run: AtomicU64,

    /// Merges performed against the snapshot store.
    pub merges: AtomicU64,

    /// `updated` events published.
    pub updates_emitted: AtomicU64,

    /// Extraction passes that failed and were treated as empty.
    pub extraction_failures: AtomicU64,

    /// Subscriber handlers that returned an error or panicked.
    pub handler_failures: AtomicU64,

    /// Log records appended while attached.
    pub log_records_seen: AtomicU64,

    /// Time of the engine start.
    start_time: parking_lot::RwLock<Option<Instant>>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of the engine.
    pub fn mark_start(&self) {
        *self.start_time.write() = Some(Instant::now());
    }

    /// Milliseconds since start, zero before start.
    pub fn uptime_ms(&self) -> u64 {
        self.start_time
            .read()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merge(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update(&self) {
        self.updates_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extraction_failure(&self) {
        self.extraction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_failures(&self, count: u64) {
        self.handler_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_log_records(&self, count: u64) {
        self.log_records_seen.fetch_add(count, Ordering::Relaxed);
    }

    /// Get a snapshot of the metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            uptime_ms: self.uptime_ms(),
            requests: self.requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            frames_run: self.frames_run.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            updates_emitted: self.updates_emitted.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            log_records_seen: self.log_records_seen.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_ms: u64,
    pub requests: u64,
    pub coalesced_requests: u64,
    pub frames_run: u64,
    pub merges: u64,
    pub updates_emitted: u64,
    pub extraction_failures: u64,
    pub handler_failures: u64,
    pub log_records_seen: u64,
}

impl MetricsSnapshot {
    /// Share of requests that did not cost an extra frame.
    pub fn coalescing_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.coalesced_requests as f64 / self.requests as f64
    }
}
