//! Live document model.
//!
//! The engine only reads the document and listens for its signals. Hosts
//! expose their tree through [`LiveDocument`]; [`MemoryDocument`] is the
//! in-process implementation used by the CLI and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SelectorError;
use crate::selector::Selector;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: [&str; 8] = ["br", "hr", "img", "input", "link", "meta", "source", "wbr"];

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// Element node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Text directly owned by this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Current value of a form control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// Child-index path from the document root to a node.
pub type NodePath = Vec<usize>;

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_attr("id", id)
    }

    pub fn with_class(mut self, class: &str) -> Self {
        let classes = match self.attrs.remove("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.attrs.insert("class".to_string(), classes);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Concatenated text of the node and its descendants, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// Markup of the node's own text and children, without the node's tag.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        self.write_inner_html(&mut out);
        out
    }

    /// Markup of the node including its own tag.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_outer_html(&mut out);
        out
    }

    fn write_inner_html(&self, out: &mut String) {
        if let Some(text) = &self.text {
            escape_into(text, false, out);
        }
        for child in &self.children {
            child.write_outer_html(out);
        }
    }

    fn write_outer_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_into(value, true, out);
            out.push('"');
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&self.tag.to_ascii_lowercase().as_str()) {
            return;
        }
        self.write_inner_html(out);
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }

    /// First descendant matching `selector`, in document order.
    pub fn query(&self, selector: &Selector) -> Option<&Node> {
        let mut found = None;
        self.walk(&mut |node, ancestors, _| {
            if selector.matches(node, ancestors) {
                found = Some(node);
                return false;
            }
            true
        });
        found
    }

    /// Every descendant matching `selector`, in document order.
    pub fn query_all(&self, selector: &Selector) -> Vec<&Node> {
        let mut found = Vec::new();
        self.walk(&mut |node, ancestors, _| {
            if selector.matches(node, ancestors) {
                found.push(node);
            }
            true
        });
        found
    }

    /// Paths of every descendant matching `selector`.
    pub fn query_paths(&self, selector: &Selector) -> Vec<NodePath> {
        let mut found = Vec::new();
        self.walk(&mut |node, ancestors, path| {
            if selector.matches(node, ancestors) {
                found.push(path.to_vec());
            }
            true
        });
        found
    }

    /// Parse `css` and return the first match.
    pub fn select_first(&self, css: &str) -> Result<Option<&Node>, SelectorError> {
        Ok(self.query(&Selector::parse(css)?))
    }

    /// Parse `css` and return every match.
    pub fn select_all(&self, css: &str) -> Result<Vec<&Node>, SelectorError> {
        Ok(self.query_all(&Selector::parse(css)?))
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get_mut(index))
    }

    /// Depth-first pre-order walk over descendants; `visit` returns `false`
    /// to stop.
    fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a Node, &[&'a Node], &[usize]) -> bool,
    {
        fn go<'a, F>(
            node: &'a Node,
            ancestors: &mut Vec<&'a Node>,
            path: &mut Vec<usize>,
            visit: &mut F,
        ) -> bool
        where
            F: FnMut(&'a Node, &[&'a Node], &[usize]) -> bool,
        {
            ancestors.push(node);
            for (index, child) in node.children.iter().enumerate() {
                path.push(index);
                let keep_going = visit(child, ancestors, path) && go(child, ancestors, path, visit);
                path.pop();
                if !keep_going {
                    ancestors.pop();
                    return false;
                }
            }
            ancestors.pop();
            true
        }

        go(self, &mut Vec::new(), &mut Vec::new(), visit);
    }
}

/// Signals emitted by a live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSignal {
    /// Structure somewhere in the tree changed.
    SubtreeChanged,
    /// A control's value changed.
    ValueChanged { target: NodePath },
    /// A control was activated (clicked, submitted).
    Activated { target: NodePath },
}

impl DocumentSignal {
    /// Target node of an interaction signal.
    pub fn target(&self) -> Option<&[usize]> {
        match self {
            DocumentSignal::SubtreeChanged => None,
            DocumentSignal::ValueChanged { target } | DocumentSignal::Activated { target } => {
                Some(target)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DocumentSignal::SubtreeChanged => "subtree",
            DocumentSignal::ValueChanged { .. } => "value",
            DocumentSignal::Activated { .. } => "activated",
        }
    }
}

/// Identifier of a registered signal listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Signal listener callback.
pub type SignalListener = Arc<dyn Fn(&DocumentSignal) + Send + Sync>;

/// A tree the engine reads and listens to.
pub trait LiveDocument: Send + Sync {
    /// Current tree. Cheap to call; the tree is shared, not copied.
    fn read(&self) -> Arc<Node>;

    /// Register a signal listener.
    fn listen(&self, listener: SignalListener) -> ListenerId;

    /// Remove a listener. Unknown ids are ignored.
    fn unlisten(&self, id: ListenerId);
}

/// In-memory live document with copy-on-write mutation.
pub struct MemoryDocument {
    root: RwLock<Arc<Node>>,
    listeners: RwLock<Vec<(ListenerId, SignalListener)>>,
    next_id: AtomicU64,
}

impl MemoryDocument {
    pub fn new(root: Node) -> Arc<Self> {
        Arc::new(Self {
            root: RwLock::new(Arc::new(root)),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Mutate the tree and signal `SubtreeChanged`.
    pub fn mutate<F: FnOnce(&mut Node)>(&self, f: F) {
        {
            let mut root = self.root.write();
            f(Arc::make_mut(&mut root));
        }
        self.notify(&DocumentSignal::SubtreeChanged);
    }

    /// Set the value of the first control matching `css` and signal
    /// `ValueChanged`. Returns whether a control was found.
    pub fn set_value(&self, css: &str, value: impl Into<String>) -> Result<bool, SelectorError> {
        let selector = Selector::parse(css)?;
        let target = {
            let mut root = self.root.write();
            let Some(path) = root.query_paths(&selector).into_iter().next() else {
                return Ok(false);
            };
            if let Some(node) = Arc::make_mut(&mut root).node_at_mut(&path) {
                node.value = Some(value.into());
            }
            path
        };
        self.notify(&DocumentSignal::ValueChanged { target });
        Ok(true)
    }

    /// Signal `Activated` on the first node matching `css`.
    pub fn activate(&self, css: &str) -> Result<bool, SelectorError> {
        let selector = Selector::parse(css)?;
        let target = self.root.read().query_paths(&selector).into_iter().next();
        match target {
            Some(target) => {
                self.notify(&DocumentSignal::Activated { target });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn notify(&self, signal: &DocumentSignal) {
        let listeners: Vec<SignalListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        trace!(signal = signal.name(), listeners = listeners.len(), "Document signal");
        for listener in listeners {
            listener(signal);
        }
    }
}

impl LiveDocument for MemoryDocument {
    fn read(&self) -> Arc<Node> {
        self.root.read().clone()
    }

    fn listen(&self, listener: SignalListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn unlisten(&self, id: ListenerId) {
        self.listeners.write().retain(|(l, _)| *l != id);
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
