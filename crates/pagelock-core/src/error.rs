//! Core error types for pagelock-core.
//!
//! This module defines the error hierarchy using thiserror. Errors here are
//! boundaries, not control flow: storage failures degrade to in-memory
//! operation, corrupt records are discarded for a fresh one, and clock
//! anomalies are resolved inline by the countdown and never surface at all.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pagelock-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Stored-record validation errors
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Coordinator construction errors
    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing store
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored payload could not be parsed
    #[error("Malformed record payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// IO failure reaching the store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validation errors for a stored timer record.
///
/// Any of these means the candidate record is discarded and the countdown
/// starts fresh; they never propagate past `initialize`.
#[derive(Error, Debug)]
pub enum RecordError {
    /// Record start is older than the maximum-age window
    #[error("Record too old: started {age_ms}ms ago")]
    TooOld { age_ms: u64 },

    /// Record start lies in the future beyond the skew tolerance
    #[error("Record starts {ahead_ms}ms in the future")]
    FutureStart { ahead_ms: u64 },

    /// Duration outside the sane bound
    #[error("Duration out of range: {duration_ms}ms")]
    DurationOutOfRange { duration_ms: u64 },

    /// Save ordering violated beyond the skew window
    #[error("Record saved {gap_ms}ms before it started")]
    SaveOrdering { gap_ms: u64 },

    /// Unknown schema version tag
    #[error("Unknown schema version: {0}")]
    UnknownSchema(String),

    /// Mutually exclusive flags both set
    #[error("Record is both active and expired")]
    Inconsistent,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Bootstrap-specific errors.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Construction failed after exhausting every retry
    #[error("Gave up constructing coordinator after {attempts} attempts")]
    GaveUp { attempts: u32 },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
