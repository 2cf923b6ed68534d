//! Error types for occupancy tracking and durable logging.

use std::path::PathBuf;
use std::time::Duration;

/// All errors surfaced by the occupancy core.
///
/// Log initialization and append failures are the durability-critical
/// variants: callers must treat them as fatal rather than keep tracking
/// without a log. Replication failures never reach the frame consumer;
/// they are folded into a [`crate::persistence::CycleReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum OccupancyError {
    #[error("working log could not be initialized at {path}: {source}")]
    LogInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("append to working log {path} failed after retry: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed log row {line} in {path}: {details}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        details: String,
    },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("snapshot copy to {target} failed: {source}")]
    Copy {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot copy to {target} timed out after {timeout:?}")]
    CopyTimedOut { target: PathBuf, timeout: Duration },
}

/// Convenience type alias for Results using OccupancyError.
pub type Result<T> = std::result::Result<T, OccupancyError>;

/// Failure while processing one frame end to end.
#[derive(Debug, thiserror::Error)]
pub enum FrameError<E> {
    #[error("detection failed: {0}")]
    Detect(E),

    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
}
