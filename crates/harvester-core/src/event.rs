//! Published events and their topics.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::readiness::Section;
use crate::value::Snapshot;

/// Topic names consumers subscribe to.
pub mod topics {
    use crate::readiness::Section;

    /// Recurring change notifications.
    pub const UPDATED: &str = "updated";

    /// One-time composite readiness.
    pub const FULLY_READY: &str = "fullyReady";

    /// One-time readiness of a single section (`sectionReady:{id}`).
    pub fn section_ready(section: Section) -> String {
        format!("sectionReady:{}", section.as_str())
    }
}

/// Result of a merge that altered at least one key.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    /// Copy of the snapshot after the merge.
    pub snapshot: Snapshot,
    /// Keys whose value changed.
    pub changed: BTreeSet<String>,
    /// Source or trigger tag, best effort.
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl ChangeRecord {
    pub fn changed_key(&self, key: &str) -> bool {
        self.changed.contains(key)
    }
}

/// Payload delivered through the event bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    /// A single section produced usable data for the first time.
    #[serde(rename_all = "camelCase")]
    SectionReady {
        section: Section,
        snapshot: Snapshot,
        elapsed_ms: u64,
    },

    /// All required sections are ready.
    #[serde(rename_all = "camelCase")]
    FullyReady { snapshot: Snapshot, elapsed_ms: u64 },

    /// The snapshot changed.
    Updated(ChangeRecord),
}

impl Event {
    /// Topic this event is published under.
    pub fn topic(&self) -> String {
        match self {
            Event::SectionReady { section, .. } => topics::section_ready(*section),
            Event::FullyReady { .. } => topics::FULLY_READY.to_string(),
            Event::Updated(_) => topics::UPDATED.to_string(),
        }
    }

    /// Snapshot carried by the event.
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            Event::SectionReady { snapshot, .. } | Event::FullyReady { snapshot, .. } => snapshot,
            Event::Updated(record) => &record.snapshot,
        }
    }

    pub fn as_change(&self) -> Option<&ChangeRecord> {
        match self {
            Event::Updated(record) => Some(record),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        assert_eq!(topics::section_ready(Section::Log), "sectionReady:log");
        assert_eq!(topics::section_ready(Section::Document), "sectionReady:document");
    }

    #[test]
    fn test_event_topic() {
        let event = Event::FullyReady {
            snapshot: Snapshot::default(),
            elapsed_ms: 3,
        };
        assert_eq!(event.topic(), "fullyReady");

        let event = Event::SectionReady {
            section: Section::Log,
            snapshot: Snapshot::default(),
            elapsed_ms: 0,
        };
        assert_eq!(event.topic(), "sectionReady:log");
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = Event::SectionReady {
            section: Section::Document,
            snapshot: Snapshot::default(),
            elapsed_ms: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "sectionReady");
        assert_eq!(json["section"], "document");
        assert_eq!(json["elapsedMs"], 12);
    }
}
