//! Minimal publish/subscribe bus.
//!
//! Handlers are kept per topic in registration order. `emit` works on a copy
//! of the subscriber list, so handlers may subscribe, unsubscribe or emit
//! again while a delivery is in flight without disturbing it. A failing or
//! panicking handler is logged and does not stop its siblings.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::error::HandlerResult;
use crate::event::Event;

type Handler = Arc<dyn Fn(&Event) -> HandlerResult + Send + Sync>;

struct HandlerEntry {
    id: u64,
    handler: Handler,
    /// Present for one-shot subscriptions; set once the handler was claimed.
    once: Option<AtomicBool>,
}

/// Outcome of a single `emit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Topic-keyed event bus.
#[derive(Default)]
pub struct EventBus {
    topics: RwLock<HashMap<String, Vec<Arc<HandlerEntry>>>>,
    next_id: AtomicU64,
}

static GLOBAL_BUS: Lazy<Arc<EventBus>> = Lazy::new(|| Arc::new(EventBus::default()));

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Process-wide bus, created on first use.
    pub fn global() -> Arc<Self> {
        GLOBAL_BUS.clone()
    }

    /// Register a handler for `topic`.
    pub fn subscribe<F>(self: &Arc<Self>, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(topic.into(), Arc::new(handler), false)
    }

    /// Register a handler that runs at most once.
    ///
    /// The subscription is removed before the handler is invoked, so a
    /// handler that emits its own topic does not see itself again.
    pub fn subscribe_once<F>(self: &Arc<Self>, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(topic.into(), Arc::new(handler), true)
    }

    fn insert(self: &Arc<Self>, topic: String, handler: Handler, once: bool) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(HandlerEntry {
            id,
            handler,
            once: once.then(|| AtomicBool::new(false)),
        });
        self.topics
            .write()
            .entry(topic.clone())
            .or_default()
            .push(entry);
        debug!(topic = %topic, id, once, "Subscribed");

        Subscription {
            bus: Arc::downgrade(self),
            topic,
            id,
            active: AtomicBool::new(true),
        }
    }

    fn remove(&self, topic: &str, id: u64) -> bool {
        let mut topics = self.topics.write();
        let Some(entries) = topics.get_mut(topic) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            topics.remove(topic);
        }
        removed
    }

    /// Deliver `event` to every handler subscribed to its topic.
    pub fn emit(&self, event: &Event) -> EmitReport {
        self.emit_to(&event.topic(), event)
    }

    /// Deliver `event` under an explicit topic.
    pub fn emit_to(&self, topic: &str, event: &Event) -> EmitReport {
        let entries: Vec<Arc<HandlerEntry>> = match self.topics.read().get(topic) {
            Some(entries) => entries.clone(),
            None => return EmitReport::default(),
        };

        let mut report = EmitReport::default();
        for entry in entries {
            if let Some(claimed) = &entry.once {
                if claimed.swap(true, Ordering::SeqCst) {
                    continue;
                }
                self.remove(topic, entry.id);
            }

            report.delivered += 1;
            match catch_unwind(AssertUnwindSafe(|| (entry.handler)(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!(topic, id = entry.id, error = %e, "Event handler failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    error!(
                        topic,
                        id = entry.id,
                        panic = panic_message(&panic),
                        "Event handler panicked"
                    );
                }
            }
        }
        report
    }

    /// Number of handlers currently subscribed to `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map(Vec::len).unwrap_or(0)
    }
}

pub(crate) fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    bus: Weak<EventBus>,
    topic: String,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the handler. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            if bus.remove(&self.topic, self.id) {
                debug!(topic = %self.topic, id = self.id, "Unsubscribed");
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
