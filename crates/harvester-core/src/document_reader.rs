//! Document reader: dispatches to the extractor for the current context kind.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bus::panic_message;
use crate::document::Node;
use crate::error::ExtractError;
use crate::extractor::{ExtractionContext, Extractor, ExtractorRegistry};
use crate::selector::Selector;
use crate::value::Patch;

/// How a document pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The extractor for a known kind ran to completion.
    Extracted,
    /// No context kind was known yet; nothing was extracted.
    KindUnknown,
    /// The extractor failed or panicked. The patch is empty.
    Failed(String),
}

/// Result of one document pass.
#[derive(Debug)]
pub struct DocumentPass {
    pub patch: Patch,
    pub outcome: PassOutcome,
    /// Controls whose interaction signals should trigger re-extraction.
    pub watched: Vec<Selector>,
}

impl DocumentPass {
    fn empty(outcome: PassOutcome) -> Self {
        Self {
            patch: Patch::new(),
            outcome,
            watched: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == PassOutcome::Extracted
    }
}

/// Selects and runs extractors, isolating their failures.
pub struct DocumentReader {
    registry: Arc<ExtractorRegistry>,
    split_min_gap: usize,
    selected: Mutex<Option<(String, Arc<dyn Extractor>)>>,
}

impl DocumentReader {
    pub fn new(registry: Arc<ExtractorRegistry>, split_min_gap: usize) -> Self {
        Self {
            registry,
            split_min_gap,
            selected: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<ExtractorRegistry> {
        &self.registry
    }

    /// Drop the cached extractor selection.
    pub fn invalidate(&self) {
        if self.selected.lock().take().is_some() {
            debug!("Extractor selection invalidated");
        }
    }

    fn select(&self, kind: &str) -> Arc<dyn Extractor> {
        let mut selected = self.selected.lock();
        if let Some((cached, extractor)) = selected.as_ref() {
            if cached == kind {
                return extractor.clone();
            }
        }
        let extractor = self.registry.resolve(kind);
        debug!(
            kind,
            registered = self.registry.contains(kind),
            "Extractor selected"
        );
        *selected = Some((kind.to_string(), extractor.clone()));
        extractor
    }

    /// Run one pass over `root` for `kind`.
    ///
    /// Never fails: errors and panics inside the extractor are logged and
    /// turned into an empty patch.
    pub fn read(&self, root: &Node, kind: Option<&str>) -> DocumentPass {
        let Some(kind) = kind.filter(|k| !k.is_empty()) else {
            debug!("Context kind not known yet, document pass skipped");
            return DocumentPass::empty(PassOutcome::KindUnknown);
        };

        let extractor = self.select(kind);
        let mut cx = ExtractionContext::new(self.split_min_gap);
        let result = catch_unwind(AssertUnwindSafe(|| extractor.extract(root, &mut cx)))
            .unwrap_or_else(|panic| Err(ExtractError::Panicked(panic_message(&panic))));

        match result {
            Ok(patch) => {
                debug!(kind, keys = patch.len(), "Document extracted");
                DocumentPass {
                    patch,
                    outcome: PassOutcome::Extracted,
                    watched: cx.into_watched(),
                }
            }
            Err(e) => {
                warn!(kind, error = %e, "Document extraction failed");
                DocumentPass::empty(PassOutcome::Failed(e.to_string()))
            }
        }
    }
}
