//! Per-kind document extractors and the registry that dispatches to them.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::document::Node;
use crate::error::{ExtractError, HarvestError, HarvestResult};
use crate::selector::Selector;
use crate::value::Patch;

/// Default minimum whitespace run after a comma for parameter splitting.
pub const DEFAULT_SPLIT_MIN_GAP: usize = 8;

/// Reads one context kind's data out of the document.
///
/// Extractors are pure functions of the tree they are given. They return a
/// patch and never merge it themselves.
pub trait Extractor: Send + Sync {
    /// Context kind this extractor handles.
    fn kind(&self) -> &str;

    /// Extract a patch from the current tree.
    fn extract(&self, root: &Node, cx: &mut ExtractionContext) -> Result<Patch, ExtractError>;
}

/// Per-pass state handed to an extractor.
#[derive(Debug)]
pub struct ExtractionContext {
    split_min_gap: usize,
    watched: Vec<Selector>,
}

impl ExtractionContext {
    pub fn new(split_min_gap: usize) -> Self {
        Self {
            split_min_gap,
            watched: Vec::new(),
        }
    }

    /// Ask for re-extraction when a control matching `css` changes value or
    /// is activated.
    pub fn watch_control(&mut self, css: &str) -> Result<(), ExtractError> {
        let selector = Selector::parse(css)?;
        if !self.watched.contains(&selector) {
            self.watched.push(selector);
        }
        Ok(())
    }

    /// Split a free-text parameter value with the configured gap.
    pub fn split_values(&self, text: &str) -> Vec<String> {
        split_parameter_values(text, self.split_min_gap)
    }

    pub fn split_min_gap(&self) -> usize {
        self.split_min_gap
    }

    pub fn watched(&self) -> &[Selector] {
        &self.watched
    }

    pub fn into_watched(self) -> Vec<Selector> {
        self.watched
    }
}

impl Default for ExtractionContext {
    fn default() -> Self {
        Self::new(DEFAULT_SPLIT_MIN_GAP)
    }
}

/// Extractor for kinds nothing else handles. Always yields an empty patch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExtractor;

impl Extractor for NoopExtractor {
    fn kind(&self) -> &str {
        ""
    }

    fn extract(&self, _root: &Node, _cx: &mut ExtractionContext) -> Result<Patch, ExtractError> {
        Ok(Patch::new())
    }
}

/// Extractors keyed by context kind.
pub struct ExtractorRegistry {
    items: DashMap<String, Arc<dyn Extractor>>,
    fallback: Arc<dyn Extractor>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            fallback: Arc::new(NoopExtractor),
        }
    }

    /// Register an extractor.
    ///
    /// Returns an error if one is already registered for the same kind.
    pub fn register(&self, extractor: Arc<dyn Extractor>) -> HarvestResult<()> {
        let kind = extractor.kind().to_string();
        if self.items.contains_key(&kind) {
            return Err(HarvestError::ExtractorAlreadyRegistered(kind));
        }
        debug!(kind = %kind, "Extractor registered");
        self.items.insert(kind, extractor);
        Ok(())
    }

    pub fn unregister(&self, kind: &str) -> HarvestResult<()> {
        self.items
            .remove(kind)
            .ok_or_else(|| HarvestError::ExtractorNotFound(kind.to_string()))?;
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Extractor>> {
        self.items.get(kind).map(|e| e.clone())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.items.contains_key(kind)
    }

    /// Extractor for `kind`, or the no-op extractor when none is registered.
    pub fn resolve(&self, kind: &str) -> Arc<dyn Extractor> {
        self.get(kind).unwrap_or_else(|| self.fallback.clone())
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.items.iter().map(|e| e.key().clone()).collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static SPLITTERS: Lazy<DashMap<usize, Regex>> = Lazy::new(DashMap::new);

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());

/// Split a free-text parameter value into discrete values.
///
/// Splits on a comma followed by at least `min_gap` whitespace characters.
/// Parts are trimmed, empty parts dropped and duplicates removed keeping the
/// first occurrence.
pub fn split_parameter_values(text: &str, min_gap: usize) -> Vec<String> {
    let splitter = match SPLITTERS.get(&min_gap) {
        Some(re) => re.clone(),
        None => match Regex::new(&format!(r",\s{{{min_gap},}}")) {
            Ok(re) => {
                SPLITTERS.insert(min_gap, re.clone());
                re
            }
            Err(e) => {
                warn!(min_gap, error = %e, "Invalid split gap, value left whole");
                return single_value(text);
            }
        },
    };

    let mut out: Vec<String> = Vec::new();
    for part in splitter.split(text) {
        let part = part.trim();
        if !part.is_empty() && !out.iter().any(|seen| seen == part) {
            out.push(part.to_string());
        }
    }
    out
}

fn single_value(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![text.to_string()]
    }
}

/// Turn a label into a key fragment: diacritics stripped, runs of non-word
/// characters collapsed to `_`, outer underscores trimmed, lower-cased.
pub fn slugify(text: &str) -> String {
    let stripped: String = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
    NON_WORD
        .replace_all(&stripped, "_")
        .trim_matches('_')
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl Extractor for Fixed {
        fn kind(&self) -> &str {
            self.0
        }

        fn extract(&self, _root: &Node, cx: &mut ExtractionContext) -> Result<Patch, ExtractError> {
            cx.watch_control("input[name=amount]")?;
            Ok([("kind", self.0)].into_iter().collect())
        }
    }

    #[test]
    fn test_split_long_gap() {
        assert_eq!(
            split_parameter_values("aaaa,                 bbbb, cccccc", 8),
            vec!["aaaa", "bbbb, cccccc"]
        );
    }

    #[test]
    fn test_split_short_gap_keeps_value_whole() {
        assert_eq!(split_parameter_values("aaaa, bbbb", 8), vec!["aaaa, bbbb"]);
    }

    #[test]
    fn test_split_dedupes_and_drops_empty() {
        let text = "red,        blue,          red,         ,         green";
        assert_eq!(split_parameter_values(text, 8), vec!["red", "blue", "green"]);
        assert!(split_parameter_values("   ", 8).is_empty());
    }

    #[test]
    fn test_split_gap_boundary() {
        let exactly = format!("a,{}b", " ".repeat(3));
        let short = format!("a,{}b", " ".repeat(2));
        assert_eq!(split_parameter_values(&exactly, 3), vec!["a", "b"]);
        assert_eq!(split_parameter_values(&short, 3).len(), 1);
        assert_eq!(split_parameter_values("a,\t\n\t\nb", 4), vec!["a", "b"]);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("parametr_Materiál"), "parametr_material");
        assert_eq!(slugify("parametr_Šířka (cm)"), "parametr_sirka_cm");
        assert_eq!(slugify("  --Hello, World!--  "), "hello_world");
        assert_eq!(slugify("___"), "");
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let registry = ExtractorRegistry::new();
        registry.register(Arc::new(Fixed("productDetail"))).unwrap();
        let err = registry.register(Arc::new(Fixed("productDetail"))).unwrap_err();
        assert!(matches!(err, HarvestError::ExtractorAlreadyRegistered(k) if k == "productDetail"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.kinds(), vec!["productDetail".to_string()]);
    }

    #[test]
    fn test_registry_resolves_noop_for_unknown() {
        let registry = ExtractorRegistry::new();
        registry.register(Arc::new(Fixed("category"))).unwrap();

        let mut cx = ExtractionContext::default();
        let patch = registry.resolve("homepage").extract(&Node::new("body"), &mut cx).unwrap();
        assert!(patch.is_empty());
        assert!(cx.watched().is_empty());

        let patch = registry.resolve("category").extract(&Node::new("body"), &mut cx).unwrap();
        assert_eq!(patch.get("kind").and_then(|v| v.as_str()), Some("category"));
        assert_eq!(cx.watched().len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = ExtractorRegistry::new();
        registry.register(Arc::new(Fixed("cart"))).unwrap();
        registry.unregister("cart").unwrap();
        assert!(!registry.contains("cart"));
        assert!(matches!(
            registry.unregister("cart"),
            Err(HarvestError::ExtractorNotFound(_))
        ));
    }

    #[test]
    fn test_watch_control_dedupes_and_validates() {
        let mut cx = ExtractionContext::new(8);
        cx.watch_control("input").unwrap();
        cx.watch_control("input").unwrap();
        assert_eq!(cx.watched().len(), 1);
        assert!(matches!(cx.watch_control("a >"), Err(ExtractError::Selector(_))));
    }
}
