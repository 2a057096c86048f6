//! Error handling for the recorder
//!
//! This module defines the error taxonomy and a Result alias used throughout
//! the crate. Only [`RecorderError::Connection`] and
//! [`RecorderError::Validation`] stop an operation from proceeding; read and
//! traversal errors are recovered locally and rendered inline by the callers.

use thiserror::Error;

/// Main error type for recorder operations
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Cannot establish or maintain the remote session
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single node read or metadata read failed
    #[error("Read error on {node_id}: {message}")]
    Read { node_id: String, message: String },

    /// Enumerating the class or children of a node failed
    #[error("Traversal error at {node_id}: {message}")]
    Traversal { node_id: String, message: String },

    /// Writing recorded rows failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Request rejected before any state was touched
    #[error("Validation error: {0}")]
    Validation(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// A remote operation exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RecorderError>,
    },
}

impl RecorderError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RecorderError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a read failure on `node_id`
    pub fn read(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        RecorderError::Read {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a traversal failure on `node_id`
    pub fn traversal(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        RecorderError::Traversal {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// The innermost message, without the variant prefix.
    ///
    /// Inline cell values use this so a failed read renders as
    /// `Error: timed out` rather than `Error: Read error on ns=2;i=5: timed out`.
    pub fn message(&self) -> String {
        match self {
            RecorderError::Connection(m)
            | RecorderError::Persistence(m)
            | RecorderError::Validation(m)
            | RecorderError::Config(m)
            | RecorderError::Timeout(m)
            | RecorderError::Serialization(m) => m.clone(),
            RecorderError::Read { message, .. } | RecorderError::Traversal { message, .. } => {
                message.clone()
            }
            RecorderError::Io(e) => e.to_string(),
            RecorderError::WithContext { source, .. } => source.message(),
        }
    }

    /// True for errors that should stop the caller's operation
    pub fn is_fatal_to_operation(&self) -> bool {
        match self {
            RecorderError::Connection(_) | RecorderError::Validation(_) => true,
            RecorderError::WithContext { source, .. } => source.is_fatal_to_operation(),
            _ => false,
        }
    }
}

/// Result type alias for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| RecorderError::Persistence(e.to_string()).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| RecorderError::Persistence(e.to_string()).with_context(f()))
    }
}
