//! Error types for vane_core

use thiserror::Error;
use vane_dom::DomError;

/// Errors raised synchronously by the widget runtime
///
/// Only usage errors end up here. Operations on untracked event queues,
/// redundant `enable`/`disable` calls and repeated `dispose` are silent
/// no-ops, and failures of asynchronous work are reported as `fail` events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WidgetError {
    /// Attempt to `set` an attribute marked read-only
    #[error("attribute is readOnly: {0}")]
    ReadOnly(String),

    /// A widget type name was registered twice
    #[error("{0} is exists!")]
    DuplicateType(String),

    /// A plugin type name was registered twice
    #[error("plugin {0} is exists!")]
    DuplicatePlugin(String),

    /// No widget type registered under this name
    #[error("Unknown widget type: {0}")]
    UnknownType(String),

    /// No plugin registered under this name
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    /// The widget was disposed and must not be reused
    #[error("Widget disposed: {0}")]
    Disposed(String),

    /// The widget needs a main element to render
    #[error("{0} requires a main element")]
    MissingMain(String),

    /// Invalid registry or declarative configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host document failure
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Result type for vane_core operations
pub type Result<T> = std::result::Result<T, WidgetError>;
