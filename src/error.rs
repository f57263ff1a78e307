//! Error handling for the operator flow engine
//!
//! This module defines the crate-level error type and a Result alias for use
//! throughout the engine. Errors raised by individual operators live in
//! [`crate::executor::OperatorError`] and never unwind through the scheduler.

use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum FlowError {
    /// Structural or type defects found before execution
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Internal scheduling invariant violated (e.g. cycle reached the planner)
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    /// Invalid graph mutation (unknown node, duplicate port, bad parameter)
    #[error("Graph error: {0}")]
    Graph(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to logging setup
    #[error("Logging error: {0}")]
    Logging(String),

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
        source: Box<FlowError>,
    },
}

impl FlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, FlowError>;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FlowError::Graph("unknown node".to_string());
        assert_eq!(err.to_string(), "Graph error: unknown node");
    }

    #[test]
    fn test_validation_error_joins_messages() {
        let err = FlowError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Validation failed: a; b");
    }

    #[test]
    fn test_error_with_context() {
        let result: Result<()> = Err(FlowError::Config("missing".to_string()));
        let err = result.context("Failed to load engine config").unwrap_err();
        assert!(err.to_string().contains("Failed to load engine config"));
        assert!(err.to_string().contains("missing"));
    }
}
