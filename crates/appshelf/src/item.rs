//! Items and the attributes resolved for them.

use std::fmt;

use thiserror::Error;

/// The derived attributes resolved for every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Human readable display name.
    Name,
    /// Icon image.
    Icon,
}

impl AttributeKind {
    /// Lowercase label used in thread names and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Icon => "icon",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an attribute could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The loader ran out of a resource (typically memory while decoding an
    /// icon). Recoverable by freeing cached attributes and trying again.
    #[error("resource exhausted while loading {0}")]
    ResourceExhausted(AttributeKind),

    /// The item cannot produce this attribute at all.
    #[error("{0} unavailable")]
    Missing(AttributeKind),
}

impl LoadError {
    /// Whether freeing memory and retrying may help.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }

    /// The attribute that failed to load.
    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::ResourceExhausted(kind) | Self::Missing(kind) => *kind,
        }
    }
}

/// An entity shown in the list, identified by a stable key.
///
/// Implementations compute their attributes synchronously; the engine always
/// calls the loaders on resolver threads, never on the presentation thread.
///
/// # Example
///
/// ```
/// use appshelf::item::{Item, LoadError};
///
/// struct App {
///     package: String,
///     label: String,
/// }
///
/// impl Item for App {
///     type Icon = Vec<u8>;
///
///     fn key(&self) -> &str {
///         &self.package
///     }
///
///     fn load_name(&self) -> Result<String, LoadError> {
///         Ok(self.label.clone())
///     }
///
///     fn load_icon(&self) -> Result<Vec<u8>, LoadError> {
///         Ok(vec![0; 16])
///     }
/// }
/// ```
pub trait Item: Send + Sync + 'static {
    /// Resolved icon value, shared between the cache and rendered rows.
    type Icon: Clone + Send + Sync + 'static;

    /// The stable identity of this item.
    fn key(&self) -> &str;

    /// Compute the display name.
    fn load_name(&self) -> Result<String, LoadError>;

    /// Compute the icon.
    fn load_icon(&self) -> Result<Self::Icon, LoadError>;
}
