//! The aggregation engine.
//!
//! Wires the log reader and the document reader into one snapshot store and
//! publishes what changes through the event bus. Log appends are merged
//! synchronously as they arrive; document passes run on the change
//! scheduler's frames. Because `start` scans the existing log before it
//! requests the first document pass, log-derived keys always land first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{EventBus, Subscription};
use crate::config::EngineConfig;
use crate::document::{DocumentSignal, ListenerId, LiveDocument};
use crate::document_reader::{DocumentReader, PassOutcome};
use crate::error::{HandlerResult, HarvestError, HarvestResult};
use crate::event::{ChangeRecord, Event};
use crate::extractor::{Extractor, ExtractorRegistry};
use crate::log::{AppendLog, LogSlot};
use crate::log_reader::{LogReader, CONTEXT_KIND_KEY};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::readiness::{ReadinessTracker, Section, Transition};
use crate::scheduler::{ChangeScheduler, FrameHost, TokioFrames};
use crate::selector::Selector;
use crate::snapshot::SnapshotStore;
use crate::value::{Patch, Snapshot, Value};

/// Builder for [`ContextEngine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    bus: Option<Arc<EventBus>>,
    frames: Option<Arc<dyn FrameHost>>,
    document: Option<Arc<dyn LiveDocument>>,
    log_slot: Option<LogSlot>,
    extractors: Vec<Arc<dyn Extractor>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish on `bus` instead of a private bus.
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Frame host for the change scheduler. Defaults to [`TokioFrames`] on
    /// the current runtime.
    pub fn frames(mut self, frames: Arc<dyn FrameHost>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn document(mut self, document: Arc<dyn LiveDocument>) -> Self {
        self.document = Some(document);
        self
    }

    /// The host's log slot. Defaults to an empty, uninitialized slot.
    pub fn log_slot(mut self, slot: LogSlot) -> Self {
        self.log_slot = Some(slot);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn build(self) -> HarvestResult<Arc<ContextEngine>> {
        let document = self
            .document
            .ok_or_else(|| HarvestError::Config("a live document is required".into()))?;
        let frames: Arc<dyn FrameHost> = match self.frames {
            Some(frames) => frames,
            None => Arc::new(TokioFrames::current(self.config.frame_interval())?),
        };

        let registry = Arc::new(ExtractorRegistry::new());
        for extractor in self.extractors {
            registry.register(extractor)?;
        }

        let config = self.config;
        let bus = self.bus.unwrap_or_else(EventBus::new);
        let log_slot = self.log_slot.unwrap_or_default();

        let engine = Arc::new_cyclic(|me: &Weak<ContextEngine>| {
            let weak = me.clone();
            let scheduler = ChangeScheduler::new(
                frames,
                Box::new(move |reason: &str| {
                    if let Some(engine) = weak.upgrade() {
                        engine.run_document_pass(reason);
                    }
                }),
            );

            ContextEngine {
                session_id: Uuid::new_v4(),
                store: SnapshotStore::new(config.change_detection),
                log_reader: LogReader::new(config.namespace.clone()),
                document_reader: DocumentReader::new(registry, config.split_min_gap),
                readiness: ReadinessTracker::new(config.required_sections.iter().copied()),
                metrics: Arc::new(EngineMetrics::new()),
                kind: RwLock::new(None),
                watched: RwLock::new(Vec::new()),
                listener: Mutex::new(None),
                attached_log: Mutex::new(None),
                log_ingest: ReentrantMutex::new(()),
                started: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                me: me.clone(),
                config,
                bus,
                document,
                log_slot,
                scheduler,
            }
        });
        debug!(session_id = %engine.session_id, "Context engine built");
        Ok(engine)
    }
}

/// Context aggregation engine for one session.
pub struct ContextEngine {
    session_id: Uuid,
    config: EngineConfig,
    bus: Arc<EventBus>,
    store: SnapshotStore,
    log_reader: LogReader,
    document_reader: DocumentReader,
    document: Arc<dyn LiveDocument>,
    log_slot: LogSlot,
    scheduler: Arc<ChangeScheduler>,
    readiness: ReadinessTracker,
    metrics: Arc<EngineMetrics>,
    kind: RwLock<Option<String>>,
    watched: RwLock<Vec<Selector>>,
    listener: Mutex<Option<ListenerId>>,
    attached_log: Mutex<Option<Arc<AppendLog>>>,
    log_ingest: ReentrantMutex<()>,
    started: AtomicBool,
    disposed: AtomicBool,
    me: Weak<ContextEngine>,
}

impl ContextEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Attach to the log and the document and request the first document
    /// pass. Calling it again is a no-op.
    pub fn start(&self) -> HarvestResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(HarvestError::Disposed);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.metrics.mark_start();
        info!(
            session_id = %self.session_id,
            namespace = %self.config.namespace,
            "Context engine started"
        );

        self.attach_log();

        let weak = self.me.clone();
        let id = self.document.listen(Arc::new(move |signal: &DocumentSignal| {
            if let Some(engine) = weak.upgrade() {
                engine.on_document_signal(signal);
            }
        }));
        *self.listener.lock() = Some(id);

        self.request_extraction("start");
        Ok(())
    }

    /// Detach from the log and the document. Frames already scheduled do
    /// nothing. Calling it again is a no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scheduler.close();
        if let Some(log) = self.attached_log.lock().take() {
            log.remove_observer(&self.observer_marker());
        }
        if let Some(id) = self.listener.lock().take() {
            self.document.unlisten(id);
        }
        info!(session_id = %self.session_id, "Context engine disposed");
    }

    fn observer_marker(&self) -> String {
        format!("context-harvester:{}", self.session_id)
    }

    fn attach_log(&self) {
        let log = self.log_slot.get_or_init();
        // Held across attach and initial ingest so appends from other threads
        // merge after the existing records. Reentrant for handlers that append.
        let _ingest = self.log_ingest.lock();

        let weak = self.me.clone();
        let (installed, existing) = log.observe_existing(
            self.observer_marker(),
            Arc::new(move |records: &[JsonValue]| {
                if let Some(engine) = weak.upgrade() {
                    engine.on_log_append(records);
                }
            }),
        );
        debug!(installed, existing = existing.len(), "Attached to append log");
        *self.attached_log.lock() = Some(log);

        self.metrics.record_log_records(existing.len() as u64);
        if let Some(patch) = self.log_reader.scan(&existing) {
            self.ingest_log(patch, "log:initial");
        }
    }

    fn on_log_append(&self, records: &[JsonValue]) {
        let _ingest = self.log_ingest.lock();
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.metrics.record_log_records(records.len() as u64);
        if let Some(patch) = self.log_reader.scan(records) {
            self.ingest_log(patch, "log:append");
        }
    }

    fn ingest_log(&self, patch: Patch, reason: &str) {
        let kind_changed = self.update_kind(&patch);

        if let Some(record) = self.merge(patch, reason) {
            self.publish_change(record);
        }
        let transition = self.readiness.mark_ready(Section::Log);
        self.publish_readiness(Section::Log, transition);

        if kind_changed {
            self.request_extraction("kind");
        }
    }

    /// Learn the context kind from a log patch. Returns whether it changed.
    fn update_kind(&self, patch: &Patch) -> bool {
        let Some(incoming) = patch.get(CONTEXT_KIND_KEY).and_then(Value::as_str) else {
            return false;
        };
        let mut kind = self.kind.write();
        if kind.as_deref() == Some(incoming) {
            return false;
        }
        let previous = kind.replace(incoming.to_string());
        drop(kind);

        match previous {
            Some(previous) => {
                warn!(from = %previous, to = incoming, "Context kind changed");
                self.document_reader.invalidate();
                self.watched.write().clear();
            }
            None => info!(kind = incoming, "Context kind discovered"),
        }
        true
    }

    fn on_document_signal(&self, signal: &DocumentSignal) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        match signal {
            DocumentSignal::SubtreeChanged => {
                self.request_extraction("mutation");
            }
            DocumentSignal::ValueChanged { target } | DocumentSignal::Activated { target } => {
                if self.is_watched(target) {
                    self.request_extraction(signal.name());
                }
            }
        }
    }

    fn is_watched(&self, target: &[usize]) -> bool {
        let watched = self.watched.read();
        if watched.is_empty() {
            return false;
        }
        let root = self.document.read();
        watched
            .iter()
            .any(|selector| root.query_paths(selector).iter().any(|p| p == target))
    }

    /// Ask for a document pass on the next frame.
    ///
    /// Returns `true` if a frame was scheduled, `false` if the request joined
    /// one already pending or the engine is disposed.
    pub fn request_extraction(&self, reason: &str) -> bool {
        if self.disposed.load(Ordering::SeqCst) {
            return false;
        }
        self.metrics.record_request();
        let scheduled = self.scheduler.request(reason);
        if !scheduled {
            self.metrics.record_coalesced();
        }
        scheduled
    }

    fn run_document_pass(&self, reason: &str) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.metrics.record_frame();

        let root = self.document.read();
        let kind = self.kind.read().clone();
        let pass = self.document_reader.read(&root, kind.as_deref());

        match &pass.outcome {
            PassOutcome::Extracted => *self.watched.write() = pass.watched,
            PassOutcome::Failed(_) => self.metrics.record_extraction_failure(),
            PassOutcome::KindUnknown => {}
        }
        let succeeded = pass.outcome == PassOutcome::Extracted;

        if !pass.patch.is_empty() {
            if let Some(record) = self.merge(pass.patch, reason) {
                self.publish_change(record);
            }
        }
        if succeeded {
            let transition = self.readiness.mark_ready(Section::Document);
            self.publish_readiness(Section::Document, transition);
        }
    }

    fn merge(&self, patch: Patch, reason: &str) -> Option<ChangeRecord> {
        self.metrics.record_merge();
        self.store.merge(patch, reason)
    }

    fn publish(&self, event: &Event) {
        let report = self.bus.emit(event);
        if report.failed > 0 {
            self.metrics.record_handler_failures(report.failed as u64);
        }
    }

    fn publish_change(&self, record: ChangeRecord) {
        debug!(
            reason = %record.reason,
            changed = record.changed.len(),
            "Snapshot updated"
        );
        self.metrics.record_update();
        self.publish(&Event::Updated(record));
    }

    fn publish_readiness(&self, section: Section, transition: Transition) {
        if transition.section_ready {
            let elapsed_ms = self.metrics.uptime_ms();
            info!(section = %section, elapsed_ms, "Section ready");
            self.publish(&Event::SectionReady {
                section,
                snapshot: self.store.read(),
                elapsed_ms,
            });
        }
        if transition.fully_ready {
            let elapsed_ms = self.metrics.uptime_ms();
            let snapshot = self.store.read();
            info!(
                session_id = %self.session_id,
                elapsed_ms,
                snapshot = %snapshot.to_json(),
                "Context fully ready"
            );
            self.publish(&Event::FullyReady {
                snapshot,
                elapsed_ms,
            });
        }
    }

    /// Register an extractor after the engine was built.
    pub fn register_extractor(&self, extractor: Arc<dyn Extractor>) -> HarvestResult<()> {
        let kind = extractor.kind().to_string();
        self.document_reader.registry().register(extractor)?;
        if self.kind.read().as_deref() == Some(kind.as_str()) {
            self.document_reader.invalidate();
            self.request_extraction("extractor");
        }
        Ok(())
    }

    /// Subscribe to one of the engine's topics.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.bus.subscribe(topic, handler)
    }

    /// Copy of the current snapshot.
    pub fn read(&self) -> Snapshot {
        self.store.read()
    }

    pub fn context_kind(&self) -> Option<String> {
        self.kind.read().clone()
    }

    pub fn is_ready(&self, section: Section) -> bool {
        self.readiness.is_ready(section)
    }

    pub fn is_fully_ready(&self) -> bool {
        self.readiness.is_fully_ready()
    }

    /// Whether a document pass is waiting for its frame.
    pub fn pending(&self) -> bool {
        self.scheduler.pending()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for ContextEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
