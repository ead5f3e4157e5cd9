//! The externally owned append log.
//!
//! The host owns an ordered, ever-growing sequence of JSON records. Readers
//! attach by registering an append observer under a marker instead of
//! replacing the append operation; the marker keeps attachment idempotent.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Callback invoked with the records of each append.
pub type AppendObserver = Arc<dyn Fn(&[JsonValue]) + Send + Sync>;

/// Ordered append-only record log.
#[derive(Default)]
pub struct AppendLog {
    records: RwLock<Vec<JsonValue>>,
    observers: RwLock<Vec<(String, AppendObserver)>>,
}

impl AppendLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a log that already holds `records`.
    pub fn with_records(records: Vec<JsonValue>) -> Arc<Self> {
        Arc::new(Self {
            records: RwLock::new(records),
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Append any number of records and return the new length.
    ///
    /// Observers run after the records are stored, outside of any lock, so
    /// they may read or append to the log themselves.
    pub fn push<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = JsonValue>,
    {
        let appended: Vec<JsonValue> = records.into_iter().collect();
        // Observers are collected under the records lock so that each record
        // is either part of an `observe_existing` copy or delivered, never
        // both and never neither.
        let (len, observers) = {
            let mut stored = self.records.write();
            stored.extend(appended.iter().cloned());
            let observers: Vec<AppendObserver> = if appended.is_empty() {
                Vec::new()
            } else {
                self.observers
                    .read()
                    .iter()
                    .map(|(_, observer)| observer.clone())
                    .collect()
            };
            (stored.len(), observers)
        };

        for observer in observers {
            observer(&appended);
        }
        len
    }

    /// Append a single record.
    pub fn push_one(&self, record: JsonValue) -> usize {
        self.push(std::iter::once(record))
    }

    /// Copy of the records present so far.
    pub fn records(&self) -> Vec<JsonValue> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Register an append observer under `marker`.
    ///
    /// Returns `false` (and keeps the existing observer) if the marker is
    /// already registered.
    pub fn observe(&self, marker: impl Into<String>, observer: AppendObserver) -> bool {
        let marker = marker.into();
        let mut observers = self.observers.write();
        if observers.iter().any(|(m, _)| *m == marker) {
            debug!(marker = %marker, "Append observer already installed");
            return false;
        }
        observers.push((marker, observer));
        true
    }

    /// Register an append observer and copy the records present so far in
    /// one step.
    ///
    /// Every record lands either in the returned copy or in a later call to
    /// `observer`, even when other threads append concurrently. Returns
    /// whether the observer was installed alongside the copy.
    pub fn observe_existing(
        &self,
        marker: impl Into<String>,
        observer: AppendObserver,
    ) -> (bool, Vec<JsonValue>) {
        let records = self.records.read();
        let installed = self.observe(marker, observer);
        (installed, records.clone())
    }

    /// Remove the observer registered under `marker`.
    pub fn remove_observer(&self, marker: &str) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(m, _)| m != marker);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

/// Host slot that may not hold a log yet.
#[derive(Default, Clone)]
pub struct LogSlot(Arc<OnceCell<Arc<AppendLog>>>);

impl LogSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot that already holds `log`.
    pub fn with_log(log: Arc<AppendLog>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(log);
        Self(Arc::new(cell))
    }

    pub fn get(&self) -> Option<Arc<AppendLog>> {
        self.0.get().cloned()
    }

    /// The log, created empty if the host has not initialized it.
    pub fn get_or_init(&self) -> Arc<AppendLog> {
        self.0.get_or_init(AppendLog::new).clone()
    }
}
