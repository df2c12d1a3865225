//! The coordinating list engine.
//!
//! [`AppList`] owns the item store, the search pattern and both resolver
//! pools. It lives on the presentation thread: every method takes effect
//! synchronously, and background results are applied only when the owner
//! drains pending work with [`process_events`](AppList::process_events) or
//! [`wait_for_events`](AppList::wait_for_events).
//!
//! Per item, two independent paths run:
//!
//! - **Name path**: registering an item schedules its name on the name pool.
//!   Each completion is counted; when every scheduled name has resolved,
//!   [`ListEvent::AllNamesLoaded`] fires once and the name pool is retired.
//! - **Icon path**: requesting a row that is missing attributes returns a
//!   placeholder at once and schedules one icon resolution for that key
//!   (which also re-resolves the name if it is not cached). When it lands,
//!   [`ListEvent::RowUpdated`] is emitted for the row, if it is still shown.
//!
//! While a search pattern is active, every newly resolved name triggers one
//! coalesced refilter, so the view converges on the names as they arrive.
//! Rows removed by activation stay out of those refilters until the pattern
//! changes.
//!
//! A loader that panics counts as a failed load: the row keeps its
//! placeholder and the name still counts as delivered.
//!
//! # Example
//!
//! ```
//! use appshelf::config::ListConfig;
//! use appshelf::item::{Item, LoadError};
//! use appshelf::list::AppList;
//! use std::time::{Duration, Instant};
//!
//! struct App(&'static str, &'static str);
//!
//! impl Item for App {
//!     type Icon = u8;
//!     fn key(&self) -> &str { self.0 }
//!     fn load_name(&self) -> Result<String, LoadError> { Ok(self.1.to_string()) }
//!     fn load_icon(&self) -> Result<u8, LoadError> { Ok(1) }
//! }
//!
//! let mut list = AppList::new(ListConfig::default()).unwrap();
//! list.register(App("a.app", "Alpha"));
//! list.register(App("b.app", "Beta"));
//!
//! let deadline = Instant::now() + Duration::from_secs(5);
//! while !list.names_loaded() && Instant::now() < deadline {
//!     list.wait_for_events(Duration::from_millis(20));
//! }
//!
//! list.set_search_pattern("BET");
//! assert_eq!(list.view_keys(), vec!["b.app"]);
//! ```

use std::collections::HashSet;
use std::ops::Range;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use appshelf_core::logging::span_names;
use appshelf_core::{LoadProgress, PerfSpan, Signal, Sink, SinkHandle, ThreadPool, ThreadPoolConfig};
use crossbeam_channel::{unbounded, Receiver};

use crate::cache::AttributeCache;
use crate::config::ListConfig;
use crate::error::ListResult;
use crate::event::ListEvent;
use crate::filter::{filter_view, highlight_spans, matches, SearchPattern};
use crate::item::{AttributeKind, Item};
use crate::resolve::{resolve_name, resolve_row, Caches, RowResolution};
use crate::store::ItemStore;

/// What the presentation layer should draw for one row right now.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSnapshot<I> {
    /// The view row.
    pub row: usize,
    /// Key of the item in the row.
    pub key: String,
    /// Display name, or the key while the name is unknown.
    pub name: String,
    /// The icon, or `None` for the placeholder.
    pub icon: Option<I>,
    /// Byte ranges of `name` matching the search pattern.
    pub highlights: Vec<Range<usize>>,
    /// Whether both attributes came from the caches. If not, a
    /// [`ListEvent::RowUpdated`] follows once resolution lands.
    pub complete: bool,
}

/// Presentation state. Only ever touched on the sink thread.
struct ListState<T: Item> {
    store: ItemStore<T>,
    pattern: SearchPattern,
    caches: Caches<T::Icon>,
    name_pool: ThreadPool,
    icon_pool: ThreadPool,
    sink: SinkHandle<ListState<T>>,
    progress: Arc<LoadProgress>,
    icons_in_flight: HashSet<String>,
    /// Keys dropped from the view by activation, kept out until the pattern
    /// changes.
    hidden: HashSet<String>,
    refilter_posted: bool,
    events: Arc<Signal<ListEvent>>,
    removal_delay: Duration,
}

impl<T: Item> ListState<T> {
    fn emit(&self, event: ListEvent) {
        tracing::trace!(target: "appshelf::list", event = event.name(), "emitting list event");
        self.events.emit(event);
    }

    fn emit_view_changed(&self) {
        self.emit(ListEvent::ViewChanged {
            rows: self.store.row_count(),
        });
    }

    fn register(&mut self, item: Arc<T>) -> bool {
        if self.store.push(item.clone()).is_none() {
            tracing::debug!(target: "appshelf::list", key = item.key(), "ignoring duplicate registration");
            return false;
        }

        let cached = self.caches.names.peek(item.key());
        let candidate = cached.as_deref().unwrap_or(item.key());
        if matches(Some(candidate), &self.pattern) {
            self.store.show_last();
        }
        self.emit_view_changed();
        self.schedule_name(item);
        true
    }

    fn schedule_name(&mut self, item: Arc<T>) {
        self.progress.schedule(1);

        // A retired name pool hands late registrations to the icon pool.
        for pool in [&self.name_pool, &self.icon_pool] {
            let caches = self.caches.clone();
            let task_item = item.clone();
            let key = item.key().to_owned();
            let submitted = pool.spawn_with_callback(
                move || resolve_name(&*task_item, &caches),
                &self.sink,
                move |state: &mut ListState<T>, name: Option<Option<String>>| {
                    state.on_name_resolved(&key, name.flatten())
                },
            );
            match submitted {
                Ok(()) => return,
                Err(err) => {
                    tracing::trace!(target: "appshelf::list", pool = pool.name(), error = %err, "pool rejected name task");
                }
            }
        }

        tracing::warn!(target: "appshelf::list", key = item.key(), "no resolver pool accepting work, name stays unresolved");
        self.on_name_resolved(item.key(), None);
    }

    fn on_name_resolved(&mut self, key: &str, name: Option<String>) {
        tracing::trace!(target: "appshelf::list", key, resolved = name.is_some(), "name delivered");
        if name.is_some() && !self.pattern.is_empty() {
            self.request_refilter();
        }
        if self.progress.complete_one() {
            tracing::debug!(
                target: "appshelf::list",
                total = self.progress.scheduled_total(),
                "all names loaded, retiring name pool"
            );
            self.name_pool.shutdown();
            self.emit(ListEvent::AllNamesLoaded);
        }
    }

    fn request_refilter(&mut self) {
        if self.refilter_posted {
            return;
        }
        let posted = self.sink.post(|state: &mut ListState<T>| {
            state.refilter_posted = false;
            state.refilter();
        });
        self.refilter_posted = posted.is_ok();
    }

    /// Recompute the view. Returns whether it changed.
    fn refilter(&mut self) -> bool {
        let _perf = PerfSpan::new(span_names::REFILTER);
        let items = self.store.items();
        let mut view = filter_view(items, &self.caches.names, &self.pattern);
        if !self.hidden.is_empty() {
            view.retain(|&position| !self.hidden.contains(items[position].key()));
        }
        let changed = self.store.set_view(view);
        if changed {
            tracing::trace!(target: "appshelf::list", rows = self.store.row_count(), pattern = %self.pattern, "view recomputed");
            self.emit_view_changed();
        }
        changed
    }

    fn set_search_pattern(&mut self, text: &str) {
        let pattern = SearchPattern::new(text);
        if pattern == self.pattern {
            return;
        }
        self.pattern = pattern;
        self.hidden.clear();
        if !self.refilter() {
            // Same rows, but highlights moved.
            self.emit_view_changed();
        }
    }

    fn request_row(&mut self, row: usize) -> Option<RowSnapshot<T::Icon>> {
        let item = self.store.row(row)?.clone();
        let key = item.key();
        let name = self.caches.names.get(key);
        let icon = self.caches.icons.get(key);
        let complete = name.is_some() && icon.is_some();

        if !complete {
            self.schedule_icon(&item);
        }

        let name = name.unwrap_or_else(|| key.to_owned());
        Some(RowSnapshot {
            row,
            key: key.to_owned(),
            highlights: highlight_spans(&name, &self.pattern),
            name,
            icon,
            complete,
        })
    }

    fn schedule_icon(&mut self, item: &Arc<T>) {
        let key = item.key();
        if !self.icons_in_flight.insert(key.to_owned()) {
            tracing::trace!(target: "appshelf::list", key, "icon already in flight");
            return;
        }

        let caches = self.caches.clone();
        let task_item = item.clone();
        let owned_key = key.to_owned();
        let submitted = self.icon_pool.spawn_with_callback(
            move || resolve_row(&*task_item, &caches),
            &self.sink,
            move |state: &mut ListState<T>, resolution: Option<RowResolution<T::Icon>>| {
                state.on_row_resolved(resolution.unwrap_or_else(|| RowResolution::unresolved(owned_key)))
            },
        );
        if let Err(err) = submitted {
            tracing::debug!(target: "appshelf::list", key, error = %err, "icon pool rejected task, keeping placeholder");
            self.icons_in_flight.remove(key);
        }
    }

    fn on_row_resolved(&mut self, resolution: RowResolution<T::Icon>) {
        self.icons_in_flight.remove(&resolution.key);

        if resolution.name.is_some() && !self.pattern.is_empty() {
            self.request_refilter();
        }
        if !resolution.resolved_anything() {
            tracing::trace!(target: "appshelf::list", key = %resolution.key, kind = %AttributeKind::Icon, "row stays a placeholder");
            return;
        }
        match self.store.row_of(&resolution.key) {
            Some(row) => self.emit(ListEvent::RowUpdated {
                row,
                key: resolution.key,
            }),
            None => {
                tracing::trace!(target: "appshelf::list", key = %resolution.key, "row no longer shown, update dropped");
            }
        }
    }

    fn activate_row(&mut self, row: usize) -> Option<String> {
        let key = self.store.row(row)?.key().to_owned();
        self.emit(ListEvent::ItemActivated { key: key.clone() });

        let hidden = key.clone();
        let scheduled = self
            .sink
            .post_delayed(self.removal_delay, move |state: &mut ListState<T>| state.hide(&hidden));
        if let Err(err) = scheduled {
            tracing::debug!(target: "appshelf::list", key = %key, error = %err, "could not schedule row removal");
        }
        Some(key)
    }

    fn hide(&mut self, key: &str) {
        if self.store.hide(key) {
            self.hidden.insert(key.to_owned());
            tracing::trace!(target: "appshelf::list", key, "row removed from view");
            self.emit_view_changed();
        }
    }

    fn remove_item(&mut self, key: &str) -> bool {
        if self.store.remove(key).is_none() {
            return false;
        }
        self.hidden.remove(key);
        tracing::debug!(target: "appshelf::list", key, "item removed");
        self.emit_view_changed();
        true
    }
}

/// A filterable list whose item names and icons resolve in the background.
///
/// `AppList` is not `Send`: create it on the presentation thread and keep it
/// there.
pub struct AppList<T: Item> {
    sink: Sink<ListState<T>>,
    config: ListConfig,
}

impl<T: Item> AppList<T> {
    /// Create an empty list and start its resolver pools.
    pub fn new(config: ListConfig) -> ListResult<Self> {
        config.validate()?;

        let prefix = &config.thread_name_prefix;
        let name_pool = ThreadPool::new(
            ThreadPoolConfig::with_threads(config.name_workers)
                .thread_name(format!("{prefix}-{}", AttributeKind::Name)),
        )?;
        let icon_pool = ThreadPool::new(
            ThreadPoolConfig::with_threads(config.icon_workers)
                .thread_name(format!("{prefix}-{}", AttributeKind::Icon)),
        )?;
        let caches = Caches::new(config.name_cache_capacity, config.icon_cache_capacity);
        let removal_delay = config.removal_delay();

        let sink = Sink::new_cyclic(|handle| ListState {
            store: ItemStore::new(),
            pattern: SearchPattern::default(),
            caches,
            name_pool,
            icon_pool,
            sink: handle.clone(),
            progress: Arc::new(LoadProgress::new()),
            icons_in_flight: HashSet::new(),
            hidden: HashSet::new(),
            refilter_posted: false,
            events: Arc::new(Signal::new()),
            removal_delay,
        });

        tracing::debug!(target: "appshelf::list", ?config, "app list created");
        Ok(Self { sink, config })
    }

    /// The configuration this list was created with.
    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// Add an item and schedule its name.
    ///
    /// Returns `false` (and changes nothing) if the key is already present.
    pub fn register(&mut self, item: T) -> bool {
        self.register_shared(Arc::new(item))
    }

    /// Add an item that is already shared.
    pub fn register_shared(&mut self, item: Arc<T>) -> bool {
        self.sink.state_mut().register(item)
    }

    /// Register every item of an enumeration. Returns how many were new.
    pub fn register_all<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut added = 0;
        for item in items {
            added += usize::from(self.register(item));
        }
        tracing::debug!(target: "appshelf::list", added, "items registered");
        added
    }

    /// Replace the search pattern and recompute the view.
    ///
    /// Items whose name has not resolved yet are left out until it does.
    pub fn set_search_pattern(&mut self, text: &str) {
        self.sink.state_mut().set_search_pattern(text);
    }

    /// The current lowercase search pattern.
    pub fn search_pattern(&self) -> &str {
        self.sink.state().pattern.as_str()
    }

    /// Number of rows in the view.
    pub fn row_count(&self) -> usize {
        self.sink.state().store.row_count()
    }

    /// The item shown in a row.
    pub fn row_at(&self, row: usize) -> Option<Arc<T>> {
        self.sink.state().store.row(row).cloned()
    }

    /// Keys of the view rows, in order.
    pub fn view_keys(&self) -> Vec<String> {
        self.sink
            .state()
            .store
            .view_keys()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    /// Number of registered items, shown or not.
    pub fn item_count(&self) -> usize {
        self.sink.state().store.len()
    }

    /// Describe a row for display, scheduling resolution of whatever is
    /// missing.
    ///
    /// Never blocks. At most one icon resolution per key is in flight.
    pub fn request_row(&mut self, row: usize) -> Option<RowSnapshot<T::Icon>> {
        self.sink.state_mut().request_row(row)
    }

    /// Report a user action on a row.
    ///
    /// Emits [`ListEvent::ItemActivated`] now and drops the row from the
    /// view after the configured removal delay. The item stays registered,
    /// and returns to the view on the next search pattern change.
    pub fn activate_row(&mut self, row: usize) -> Option<String> {
        self.sink.state_mut().activate_row(row)
    }

    /// Delete an item from the list entirely. Cached attributes are kept.
    pub fn remove_item(&mut self, key: &str) -> bool {
        self.sink.state_mut().remove_item(key)
    }

    /// Release cached icons, for when the host is low on memory.
    pub fn trim_memory(&self) {
        self.sink.state().caches.icons.clear();
    }

    /// Signal carrying every [`ListEvent`].
    pub fn events(&self) -> Arc<Signal<ListEvent>> {
        self.sink.state().events.clone()
    }

    /// Receive every future [`ListEvent`] on a channel.
    ///
    /// The connection is dropped on the first event after the receiver is.
    pub fn subscribe(&self) -> Receiver<ListEvent> {
        let (sender, receiver) = unbounded();
        let events = self.events();
        let signal = Arc::downgrade(&events);
        let connection = Arc::new(OnceLock::new());
        let own = connection.clone();

        let id = events.connect(move |event: &ListEvent| {
            if sender.send(event.clone()).is_err() {
                if let (Some(signal), Some(id)) = (signal.upgrade(), own.get()) {
                    signal.disconnect(*id);
                }
            }
        });
        let _ = connection.set(id);
        receiver
    }

    /// Apply every background result that has arrived, without blocking.
    ///
    /// Returns the number of jobs run.
    pub fn process_events(&mut self) -> usize {
        self.sink.process_pending()
    }

    /// Wait up to `timeout` for background results, then apply them.
    pub fn wait_for_events(&mut self, timeout: Duration) -> usize {
        self.sink.wait_and_process(timeout)
    }

    /// Whether every scheduled name has resolved.
    pub fn names_loaded(&self) -> bool {
        self.sink.state().progress.is_fully_loaded()
    }

    /// Name resolutions scheduled but not yet delivered.
    pub fn outstanding_names(&self) -> usize {
        self.sink.state().progress.outstanding()
    }

    /// Name loading progress.
    pub fn progress(&self) -> Arc<LoadProgress> {
        self.sink.state().progress.clone()
    }

    /// Icon resolutions in flight.
    pub fn pending_icon_loads(&self) -> usize {
        self.sink.state().icons_in_flight.len()
    }

    /// Row removals waiting for their delay.
    pub fn pending_removals(&self) -> usize {
        self.sink.pending_delayed()
    }

    /// The name cache.
    pub fn name_cache(&self) -> &AttributeCache<String, String> {
        &self.sink.state().caches.names
    }

    /// The icon cache.
    pub fn icon_cache(&self) -> &AttributeCache<String, T::Icon> {
        &self.sink.state().caches.icons
    }

    /// Whether the name pool has been retired.
    pub fn name_pool_retired(&self) -> bool {
        self.sink.state().name_pool.is_shut_down()
    }

    /// Stop both resolver pools from accepting work.
    ///
    /// Resolutions already running finish and are still delivered. Rows
    /// requested afterwards keep their placeholders.
    pub fn shutdown(&self) {
        let state = self.sink.state();
        let name = state.name_pool.shutdown();
        let icon = state.icon_pool.shutdown();
        if name || icon {
            tracing::debug!(target: "appshelf::list", "app list shut down");
        }
    }
}

impl<T: Item> Drop for AppList<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Item> std::fmt::Debug for AppList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.sink.state();
        f.debug_struct("AppList")
            .field("store", &state.store)
            .field("pattern", &state.pattern)
            .field("outstanding_names", &state.progress.outstanding())
            .field("icons_in_flight", &state.icons_in_flight.len())
            .finish()
    }
}
