//! Error types for SHMPROG

use std::io;
use thiserror::Error;

/// Errors raised by the counter block, coordinator and worker handles.
///
/// A worker's own task failure is deliberately absent: it belongs to the
/// worker's error type and to whatever supervisor launched it.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// The named region already exists or the OS refused to allocate it
    #[error("failed to create shared memory block '{name}': {source}")]
    ResourceCreation {
        name: String,
        #[source]
        source: io::Error,
    },

    /// No region with this name exists, or it is not a counter block
    #[error("failed to attach to shared memory block '{name}': {source}")]
    Attach {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("worker id {worker_id} out of range for a block of {n_workers} workers")]
    InvalidWorkerId { worker_id: usize, n_workers: usize },

    #[error("invalid worker count: {0}")]
    InvalidWorkerCount(String),

    /// The handle or coordinator was already closed
    #[error("shared memory block is closed")]
    Closed,

    #[error("display loop already started")]
    DisplayAlreadyRunning,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProgressError {
    pub(crate) fn attach(name: &str, source: io::Error) -> Self {
        ProgressError::Attach {
            name: name.to_string(),
            source,
        }
    }

    pub(crate) fn creation(name: &str, source: io::Error) -> Self {
        ProgressError::ResourceCreation {
            name: name.to_string(),
            source,
        }
    }
}

/// Result alias used throughout the crate
pub type ProgressResult<T> = Result<T, ProgressError>;
