//! Error types for the appshelf runtime.

use std::fmt;

/// The main error type for runtime operations.
#[derive(Debug)]
pub enum CoreError {
    /// Thread pool related error.
    ThreadPool(ThreadPoolError),
    /// Presentation sink related error.
    Sink(SinkError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadPool(err) => write!(f, "Thread pool error: {err}"),
            Self::Sink(err) => write!(f, "Sink error: {err}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ThreadPool(err) => Some(err),
            Self::Sink(err) => Some(err),
        }
    }
}

/// Thread pool specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadPoolError {
    /// The underlying worker threads could not be created.
    CreationFailed(String),
    /// The pool has been shut down and no longer accepts tasks.
    ShutDown,
}

impl fmt::Display for ThreadPoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreationFailed(msg) => write!(f, "Failed to create thread pool: {msg}"),
            Self::ShutDown => write!(f, "Thread pool has been shut down"),
        }
    }
}

impl std::error::Error for ThreadPoolError {}

impl From<ThreadPoolError> for CoreError {
    fn from(err: ThreadPoolError) -> Self {
        Self::ThreadPool(err)
    }
}

/// Presentation sink specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The consuming side of the sink has been dropped.
    Disconnected,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Presentation sink has been dropped"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<SinkError> for CoreError {
    fn from(err: SinkError) -> Self {
        Self::Sink(err)
    }
}

/// A specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, CoreError>;
