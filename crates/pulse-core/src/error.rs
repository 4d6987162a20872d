//! Error types for Pulse Core
//!
//! Emission never surfaces errors to the caller; the variants here cover the
//! analysis side (discovery, configuration, explicit inspector activation).
//! We use `thiserror` for the Display/Error implementations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Pulse operations
pub type Result<T> = std::result::Result<T, PulseError>;

/// Main error type for Pulse operations
#[derive(Error, Debug)]
pub enum PulseError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be decoded
    #[error("Configuration error in {path}: {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Caller supplied something unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Nothing to analyze under the log directory
    #[error("No log files found under {0}")]
    NoLogFiles(PathBuf),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<PulseError>,
    },
}

impl PulseError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True when the root cause is an empty log directory.
    pub fn is_no_log_files(&self) -> bool {
        match self {
            Self::NoLogFiles(_) => true,
            Self::WithContext { source, .. } => source.is_no_log_files(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}
