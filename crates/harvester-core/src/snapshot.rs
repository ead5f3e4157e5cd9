//! Snapshot store: the flat key/value picture of the session and its diff.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::trace;

use crate::event::ChangeRecord;
use crate::value::{ChangeDetection, Patch, Snapshot, Value};

/// Owns the merged snapshot. Only [`SnapshotStore::merge`] mutates it.
#[derive(Default)]
pub struct SnapshotStore {
    values: RwLock<BTreeMap<String, Value>>,
    detection: ChangeDetection,
}

impl SnapshotStore {
    pub fn new(detection: ChangeDetection) -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            detection,
        }
    }

    /// Merge `patch` key by key.
    ///
    /// Returns `None` when no key changed. A missing key reads as
    /// `Undefined`, so patching `Undefined` onto an absent key is not a
    /// change and does not create the key.
    pub fn merge(&self, patch: Patch, reason: &str) -> Option<ChangeRecord> {
        let mut changed = BTreeSet::new();

        let snapshot = {
            let mut values = self.values.write();
            for (key, incoming) in patch {
                let current = values.get(&key).unwrap_or(&Value::Undefined);
                if self.detection.same(current, &incoming) {
                    continue;
                }
                trace!(key = %key, reason, "Snapshot key changed");
                changed.insert(key.clone());
                values.insert(key, incoming);
            }
            if changed.is_empty() {
                return None;
            }
            Snapshot::from_map(values.clone())
        };

        Some(ChangeRecord {
            snapshot,
            changed,
            reason: reason.to_string(),
            at: Utc::now(),
        })
    }

    /// Fresh shallow copy of the current snapshot.
    pub fn read(&self) -> Snapshot {
        Snapshot::from_map(self.values.read().clone())
    }

    /// Current value of a single key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    pub fn detection(&self) -> ChangeDetection {
        self.detection
    }
}
