//! Error types for the appshelf engine.

use appshelf_core::CoreError;
use thiserror::Error;

/// Errors surfaced by [`AppList`](crate::list::AppList) construction and
/// configuration.
///
/// Attribute load failures never appear here; they degrade to placeholders.
#[derive(Error, Debug)]
pub enum ListError {
    /// The configuration is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A runtime primitive failed, for example a pool could not start.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A TOML configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl From<appshelf_core::ThreadPoolError> for ListError {
    fn from(err: appshelf_core::ThreadPoolError) -> Self {
        Self::Core(err.into())
    }
}

/// Result type for engine operations.
pub type ListResult<T> = std::result::Result<T, ListError>;
