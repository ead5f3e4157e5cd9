//! One-time readiness of the source sections.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A source section of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Log,
    Document,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Log, Section::Document];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Log => "log",
            Section::Document => "document",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| format!("unknown section: {s}"))
    }
}

/// What a `mark_ready` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    /// The section became ready with this call.
    pub section_ready: bool,
    /// All required sections became ready with this call.
    pub fully_ready: bool,
}

/// Tracks per-section flags; each flips to ready once and never resets.
pub struct ReadinessTracker {
    required: Vec<Section>,
    ready: Mutex<BTreeSet<Section>>,
    fully_ready: AtomicBool,
}

impl ReadinessTracker {
    pub fn new(required: impl IntoIterator<Item = Section>) -> Self {
        let mut required: Vec<Section> = required.into_iter().collect();
        required.sort();
        required.dedup();
        Self {
            required,
            ready: Mutex::new(BTreeSet::new()),
            fully_ready: AtomicBool::new(false),
        }
    }

    pub fn mark_ready(&self, section: Section) -> Transition {
        let (section_ready, all_ready) = {
            let mut ready = self.ready.lock();
            let newly = ready.insert(section);
            (newly, self.required.iter().all(|s| ready.contains(s)))
        };
        let fully_ready = all_ready && !self.fully_ready.swap(true, Ordering::SeqCst);
        Transition {
            section_ready,
            fully_ready,
        }
    }

    pub fn is_ready(&self, section: Section) -> bool {
        self.ready.lock().contains(&section)
    }

    pub fn is_fully_ready(&self) -> bool {
        self.fully_ready.load(Ordering::SeqCst)
    }

    pub fn required(&self) -> &[Section] {
        &self.required
    }
}
