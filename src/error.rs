//! Error handling for pipeflow
//!
//! This module defines the crate error type and a Result alias for use
//! throughout the dispatcher, the value bridge and the configuration layer.

use rhai::{Dynamic, EvalAltResult, Position};
use thiserror::Error;

/// Main error type for pipeflow operations
#[derive(Error, Debug)]
pub enum Error {
    /// A value crossed the bridge with a shape outside the supported set
    #[error("convert {src} to {dst} unexpected")]
    UnexpectedType { src: String, dst: String },

    /// Nested value exceeded the conversion depth limit
    #[error("value nesting exceeds {0} levels")]
    Nesting(usize),

    /// Errors reported while building a pipe's program
    #[error("compile {pipe}: {message}")]
    Compile { pipe: String, message: String },

    /// Runtime errors raised by a pipe's script
    #[error("script {pipe}: {message}")]
    Script { pipe: String, message: String },

    /// The run was interrupted by its cancellation token
    #[error("script {pipe}: cancelled")]
    Cancelled { pipe: String },

    /// Errors returned by modify/notify listeners
    #[error("Listener error: {0}")]
    Listener(String),

    /// Errors returned by plugin hooks
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

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
        source: Box<Error>,
    },

    /// Errors of several independent runs, joined
    #[error("flow: {}", join(.0))]
    Aggregate(Vec<Error>),
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build an [`Error::UnexpectedType`] from the two type names
    pub fn unexpected(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Error::UnexpectedType {
            src: src.into(),
            dst: dst.into(),
        }
    }

    /// Create a script error from a Rhai error raised inside `pipe`
    pub fn from_rhai_error(pipe: impl Into<String>, err: Box<EvalAltResult>) -> Self {
        let pipe = pipe.into();
        if is_terminated(&err) {
            return Error::Cancelled { pipe };
        }
        Error::Script {
            pipe,
            message: err.to_string(),
        }
    }

    /// Errors of the individual runs when this is an aggregate
    pub fn causes(&self) -> &[Error] {
        match self {
            Error::Aggregate(errors) => errors,
            _ => std::slice::from_ref(self),
        }
    }

    /// True when the error (or any wrapped cause) is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled { .. } => true,
            Error::WithContext { source, .. } => source.is_cancelled(),
            Error::Aggregate(errors) => errors.iter().any(Error::is_cancelled),
            _ => false,
        }
    }
}

fn is_terminated(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorTerminated(..) => true,
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => is_terminated(inner),
        _ => false,
    }
}

impl From<Error> for Box<EvalAltResult> {
    fn from(err: Error) -> Self {
        EvalAltResult::ErrorRuntime(Dynamic::from(err.to_string()), Position::NONE).into()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias for pipeflow operations
pub type Result<T> = std::result::Result<T, Error>;

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

impl<T> ResultExt<T> for std::result::Result<T, Box<EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        let context = context.into();
        self.map_err(|e| Error::from_rhai_error(context, e))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::from_rhai_error(f(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::unexpected("i64", "Meta");
        assert_eq!(err.to_string(), "convert i64 to Meta unexpected");
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::Config("bad limit".to_string());
        let with_ctx = err.with_context("Failed to load");
        assert!(with_ctx.to_string().contains("Failed to load"));
        assert!(with_ctx.to_string().contains("bad limit"));
    }

    #[test]
    fn test_aggregate_display_lists_every_cause() {
        let err = Error::Aggregate(vec![
            Error::Listener("first".to_string()),
            Error::Listener("second".to_string()),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("flow: "));
        assert!(text.contains("first"));
        assert!(text.contains("second"));
        assert_eq!(err.causes().len(), 2);
    }

    #[test]
    fn test_terminated_maps_to_cancelled() {
        let err: Box<EvalAltResult> =
            EvalAltResult::ErrorTerminated(Dynamic::UNIT, Position::NONE).into();
        let err = Error::from_rhai_error("p1", err);
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "script p1: cancelled");
    }

    #[test]
    fn test_crate_error_into_rhai() {
        let err: Box<EvalAltResult> = Error::Listener("nope".to_string()).into();
        assert!(err.to_string().contains("nope"));
    }
}
