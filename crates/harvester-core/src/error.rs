//! Error types for the harvester engine.

use thiserror::Error;

/// Errors that can occur in the engine.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Engine has already been disposed.
    #[error("Engine has been disposed")]
    Disposed,

    /// An extractor for this context kind is already registered.
    #[error("Extractor already registered for kind: {0}")]
    ExtractorAlreadyRegistered(String),

    /// No extractor registered under this kind.
    #[error("Extractor not found for kind: {0}")]
    ExtractorNotFound(String),

    /// Selector could not be parsed.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No async runtime available for the frame host.
    #[error("No runtime: {0}")]
    NoRuntime(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type HarvestResult<T> = Result<T, HarvestError>;

/// Errors raised by an extractor while reading the document.
///
/// These never leave the document reader: a failing pass is logged and
/// treated as an empty patch.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A node the extractor relies on is absent.
    #[error("Missing node: {0}")]
    MissingNode(String),

    /// A node was present but its content could not be interpreted.
    #[error("Malformed content at {selector}: {message}")]
    Malformed { selector: String, message: String },

    /// Selector used by the extractor is invalid.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// The extractor panicked.
    #[error("Extractor panicked: {0}")]
    Panicked(String),
}

/// Selector parse errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unexpected character {found:?} at offset {offset} in selector {selector:?}")]
    Unexpected {
        selector: String,
        offset: usize,
        found: char,
    },

    #[error("Unterminated attribute filter in selector {0:?}")]
    UnterminatedAttribute(String),
}

/// Error returned by an event handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for event handlers.
pub type HandlerResult = Result<(), HandlerError>;
