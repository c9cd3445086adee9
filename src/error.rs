//! Error types for exposure-sync
//!
//! This module provides the error handling for the library:
//! - One variant per failure kind of a sync run (network, parse, validation,
//!   asset persistence, content item persistence)
//! - Database errors with the failing operation in the message
//! - A fatality classification used by the orchestrator to decide between
//!   aborting the run and absorbing the failure for a single story

use thiserror::Error;

/// Result type alias for exposure-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for exposure-sync
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "endpoint")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Fetching the story collection failed at the transport level
    #[error("network error: {0}")]
    Network(String),

    /// The story payload is not the expected JSON shape
    #[error("parse error: {0}")]
    Parse(String),

    /// A single story carries a value that cannot be used
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Creating the thumbnail asset for a story failed
    #[error("failed to create thumbnail asset for {uri}: {reason}")]
    AssetPersist {
        /// Remote thumbnail URI that was being referenced
        uri: String,
        /// Underlying store failure
        reason: String,
    },

    /// Creating the content item for a story failed
    #[error("failed to create content item for {source_url}: {reason}")]
    RecordPersist {
        /// Dedup key of the story that could not be written
        source_url: String,
        /// Underlying store failure
        reason: String,
    },
}

impl Error {
    /// Whether this error stops a sync run when it surfaces from a pipeline stage.
    ///
    /// Asset and validation failures only affect the story being processed; everything
    /// else (transport, payload shape, content item writes, storage) ends the run.
    /// A [`SyncConfig`](crate::config::SyncConfig) failure policy can still downgrade
    /// record-level failures.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::AssetPersist { .. } | Error::Validation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// A story field that could not be turned into a content item value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `published_at` does not have the `<19-char datetime><6-char offset>` layout
    #[error("unsupported publication timestamp layout: {value:?}")]
    TimestampLayout {
        /// The rejected value
        value: String,
    },

    /// The local date-time part could not be parsed
    #[error("invalid publication date-time {value:?}: {reason}")]
    TimestampDateTime {
        /// The rejected date-time part
        value: String,
        /// Parser message
        reason: String,
    },

    /// The UTC offset part could not be parsed
    #[error("invalid UTC offset {value:?}")]
    TimestampOffset {
        /// The rejected offset part
        value: String,
    },
}
