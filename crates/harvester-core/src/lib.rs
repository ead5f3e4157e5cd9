//! # Harvester Core
//!
//! Context aggregation and change-notification engine.
//!
//! Two sources feed one flat snapshot:
//!
//! - the **append log**, an externally owned, ever-growing record sequence
//!   read by the [`LogReader`];
//! - the **live document**, a mutable tree read by per-kind [`Extractor`]s
//!   through the [`DocumentReader`].
//!
//! ```text
//!  log append ──► LogReader ──────────────┐
//!                                          ▼
//!  document signal ─► ChangeScheduler ─► DocumentReader ─► SnapshotStore::merge
//!                      (one pass/frame)                         │
//!                                                               ▼
//!                         ReadinessTracker ──────────────────► EventBus
//!                                                   sectionReady:* / fullyReady / updated
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use harvester_core::{
//!     topics, AppendLog, ContextEngine, LogSlot, ManualFrames, MemoryDocument, Node,
//! };
//! use serde_json::json;
//!
//! let frames = ManualFrames::new();
//! let log = AppendLog::new();
//! let engine = ContextEngine::builder()
//!     .frames(frames.clone())
//!     .document(MemoryDocument::new(Node::new("body")))
//!     .log_slot(LogSlot::with_log(log.clone()))
//!     .build()
//!     .unwrap();
//!
//! engine.subscribe(topics::FULLY_READY, |event| {
//!     println!("{}", serde_json::to_string(event)?);
//!     Ok(())
//! });
//! engine.start().unwrap();
//! log.push_one(json!({"shoptet": {"pageType": "homepage"}}));
//! frames.run_frame();
//! ```

pub mod bus;
pub mod config;
pub mod document;
pub mod document_reader;
pub mod engine;
pub mod error;
pub mod event;
pub mod extractor;
pub mod log;
pub mod log_reader;
pub mod metrics;
pub mod readiness;
pub mod scheduler;
pub mod selector;
pub mod snapshot;
pub mod value;

pub use bus::{EmitReport, EventBus, Subscription};
pub use config::EngineConfig;
pub use document::{
    DocumentSignal, ListenerId, LiveDocument, MemoryDocument, Node, NodePath, SignalListener,
};
pub use document_reader::{DocumentPass, DocumentReader, PassOutcome};
pub use engine::{ContextEngine, EngineBuilder};
pub use error::{
    ExtractError, HandlerError, HandlerResult, HarvestError, HarvestResult, SelectorError,
};
pub use event::{topics, ChangeRecord, Event};
pub use extractor::{
    slugify, split_parameter_values, ExtractionContext, Extractor, ExtractorRegistry,
    NoopExtractor, DEFAULT_SPLIT_MIN_GAP,
};
pub use log::{AppendLog, AppendObserver, LogSlot};
pub use log_reader::{coerce_number, LogReader, CART_ITEMS_KEY, CONTEXT_KIND_KEY};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use readiness::{ReadinessTracker, Section, Transition};
pub use scheduler::{ChangeScheduler, FrameCallback, FrameHost, FrameRun, ManualFrames, TokioFrames};
pub use selector::Selector;
pub use snapshot::SnapshotStore;
pub use value::{ChangeDetection, Patch, Snapshot, Value};
