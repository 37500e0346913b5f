//! Error handling for streamlog-rs
//!
//! This module defines the error taxonomy shared by the container, event
//! logging and session joining layers, plus a Result alias.
//!
//! # Recoverable vs fatal
//!
//! - [`StreamLogError::TruncatedRecord`] and [`StreamLogError::MalformedMessage`]
//!   are local conditions: they are counted and reported but never abort a
//!   load or a capture.
//! - Everything raised on the write path is fatal to that capture path.
//! - [`StreamLogError::Format`] and [`StreamLogError::UnsupportedEncoding`]
//!   abort a whole load.

use thiserror::Error;

/// Main error type for streamlog-rs operations
#[derive(Error, Debug)]
pub enum StreamLogError {
    /// Bad magic constant or malformed header/metadata
    #[error("Format error: {0}")]
    Format(String),

    /// Sample encoding code not recognized
    #[error("Unsupported sample encoding code: {0}")]
    UnsupportedEncoding(u32),

    /// Final record of a container is incomplete
    #[error("Truncated record: {dangling_bytes} trailing bytes after {complete_records} complete records")]
    TruncatedRecord {
        complete_records: usize,
        dangling_bytes: usize,
    },

    /// Sample vector length does not match the channel count
    #[error("Encoding error: expected {expected} samples, got {actual}")]
    Encoding { expected: usize, actual: usize },

    /// No session or file matched a lookup key
    #[error("No match: {0}")]
    NoMatch(String),

    /// A single event message could not be decoded
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Errors related to configuration loading/saving or invalid parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication with a capture worker
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV table errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<StreamLogError>,
    },
}

impl StreamLogError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        StreamLogError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error is a local condition that must not abort the
    /// surrounding operation
    pub fn is_recoverable(&self) -> bool {
        match self {
            StreamLogError::TruncatedRecord { .. } | StreamLogError::MalformedMessage(_) => true,
            StreamLogError::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StreamLogError {
    fn from(err: serde_json::Error) -> Self {
        StreamLogError::Serialization(err.to_string())
    }
}

/// Result type alias for streamlog-rs operations
pub type Result<T> = std::result::Result<T, StreamLogError>;

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
        self.map_err(|e| StreamLogError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| StreamLogError::Io(e).with_context(f()))
    }
}
