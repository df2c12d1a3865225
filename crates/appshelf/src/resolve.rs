//! Attribute resolution tasks.
//!
//! These functions run on resolver pool threads. They call the item's
//! loaders, store successful results in the shared caches and hand the
//! outcome back to the caller, which forwards it to the presentation sink.
//!
//! Resource exhaustion is recovered locally: both caches are cleared and the
//! load is attempted exactly once more. Any remaining failure is reported as
//! a missing value, never as an error to the presentation layer.

use std::sync::Arc;

use appshelf_core::logging::span_names;

use crate::cache::AttributeCache;
use crate::item::{AttributeKind, Item, LoadError};

/// The two attribute caches, shared between resolver threads and the sink.
pub struct Caches<I> {
    /// Resolved display names by item key.
    pub names: Arc<AttributeCache<String, String>>,
    /// Resolved icons by item key.
    pub icons: Arc<AttributeCache<String, I>>,
}

impl<I> Clone for Caches<I> {
    fn clone(&self) -> Self {
        Self {
            names: self.names.clone(),
            icons: self.icons.clone(),
        }
    }
}

impl<I: Clone> Caches<I> {
    /// Create empty caches with the given capacities.
    pub fn new(name_capacity: usize, icon_capacity: usize) -> Self {
        Self {
            names: Arc::new(AttributeCache::new("names", name_capacity)),
            icons: Arc::new(AttributeCache::new("icons", icon_capacity)),
        }
    }

    /// Drop every cached attribute of every kind.
    pub fn clear_all(&self) {
        self.names.clear();
        self.icons.clear();
    }
}

impl<I> std::fmt::Debug for Caches<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caches")
            .field("names", &self.names)
            .field("icons", &self.icons)
            .finish()
    }
}

/// Outcome of resolving the attributes behind one row.
#[derive(Debug, Clone)]
pub struct RowResolution<I> {
    /// Key of the item the row shows.
    pub key: String,
    /// The name, if this task had to resolve it and succeeded.
    pub name: Option<String>,
    /// The icon, if this task had to resolve it and succeeded.
    pub icon: Option<I>,
}

impl<I> RowResolution<I> {
    /// A resolution that produced nothing for `key`.
    pub fn unresolved(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            icon: None,
        }
    }

    /// Whether this task produced anything new for the row.
    pub fn resolved_anything(&self) -> bool {
        self.name.is_some() || self.icon.is_some()
    }
}

/// Run `load`, and on resource exhaustion clear both caches and run it once
/// more.
pub fn with_exhaustion_retry<V, I, F>(
    kind: AttributeKind,
    key: &str,
    caches: &Caches<I>,
    load: F,
) -> Result<V, LoadError>
where
    I: Clone,
    F: Fn() -> Result<V, LoadError>,
{
    match load() {
        Err(err) if err.is_resource_exhaustion() => {
            tracing::warn!(target: "appshelf::resolve", %kind, key, "resource exhausted, clearing caches and retrying");
            caches.clear_all();
            load().inspect_err(|err| {
                tracing::debug!(target: "appshelf::resolve", %kind, key, error = %err, "retry failed, keeping placeholder");
            })
        }
        Err(err) => {
            tracing::debug!(target: "appshelf::resolve", %kind, key, error = %err, "attribute unavailable");
            Err(err)
        }
        ok => ok,
    }
}

/// Resolve an item's display name and store it in the name cache.
#[tracing::instrument(skip_all, fields(key = %item.key()), target = "appshelf::resolve", level = "trace")]
pub fn resolve_name<T: Item>(item: &T, caches: &Caches<T::Icon>) -> Option<String> {
    let name = with_exhaustion_retry(AttributeKind::Name, item.key(), caches, || item.load_name()).ok()?;
    caches.names.put(item.key().to_owned(), name.clone());
    Some(name)
}

/// Resolve whichever of a row's attributes are not cached.
pub fn resolve_row<T: Item>(item: &T, caches: &Caches<T::Icon>) -> RowResolution<T::Icon> {
    let _span = tracing::trace_span!(target: "appshelf::resolve", span_names::RESOLVE, key = %item.key()).entered();
    let name = if caches.names.contains(item.key()) {
        None
    } else {
        resolve_name(item, caches)
    };

    let icon = if caches.icons.contains(item.key()) {
        None
    } else {
        let icon = with_exhaustion_retry(AttributeKind::Icon, item.key(), caches, || item.load_icon()).ok();
        if let Some(icon) = &icon {
            caches.icons.put(item.key().to_owned(), icon.clone());
        }
        icon
    };

    RowResolution {
        key: item.key().to_owned(),
        name,
        icon,
    }
}
