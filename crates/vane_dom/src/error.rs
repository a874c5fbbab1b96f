//! Host document error types

use thiserror::Error;

/// Errors raised by the host document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// A node handle no longer refers to a live node
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A selector could not be parsed
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Result type for host document operations
pub type Result<T> = std::result::Result<T, DomError>;
