//! The full item set and its filtered view.
//!
//! [`ItemStore`] keeps every registered item in registration order, plus a
//! row mapping from view rows to positions in the full set. The view is
//! always an order-preserving subset of the full set.

use std::collections::HashMap;
use std::sync::Arc;

use crate::item::Item;

/// Ordered item set with a filtered, order-preserving view.
pub struct ItemStore<T> {
    items: Vec<Arc<T>>,
    positions: HashMap<String, usize>,
    /// Mapping from view row to position in `items`, strictly increasing.
    view: Vec<usize>,
}

impl<T: Item> Default for ItemStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Item> ItemStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
            view: Vec::new(),
        }
    }

    /// Append an item to the full set.
    ///
    /// Returns its position, or `None` if an item with the same key is
    /// already registered. The view is not touched.
    pub fn push(&mut self, item: Arc<T>) -> Option<usize> {
        if self.positions.contains_key(item.key()) {
            return None;
        }
        let position = self.items.len();
        self.positions.insert(item.key().to_owned(), position);
        self.items.push(item);
        Some(position)
    }

    /// Append a full-set position to the end of the view.
    ///
    /// Only valid for the most recently pushed item, which keeps the view
    /// ordered.
    pub fn show_last(&mut self) {
        if let Some(last) = self.items.len().checked_sub(1) {
            if self.view.last().is_none_or(|&tail| tail < last) {
                self.view.push(last);
            }
        }
    }

    /// Replace the view with a new mapping.
    ///
    /// Returns `true` if the mapping changed.
    pub fn set_view(&mut self, view: Vec<usize>) -> bool {
        debug_assert!(view.windows(2).all(|pair| pair[0] < pair[1]));
        debug_assert!(view.last().is_none_or(|&last| last < self.items.len()));
        if self.view == view {
            return false;
        }
        self.view = view;
        true
    }

    /// All registered items, in registration order.
    pub fn items(&self) -> &[Arc<T>] {
        &self.items
    }

    /// Number of registered items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether an item with this key is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Look up a registered item by key.
    pub fn get(&self, key: &str) -> Option<&Arc<T>> {
        self.positions.get(key).map(|&position| &self.items[position])
    }

    /// Number of rows in the view.
    pub fn row_count(&self) -> usize {
        self.view.len()
    }

    /// The item shown at a view row.
    pub fn row(&self, row: usize) -> Option<&Arc<T>> {
        self.view.get(row).map(|&position| &self.items[position])
    }

    /// The view row currently showing `key`, if any.
    pub fn row_of(&self, key: &str) -> Option<usize> {
        let position = *self.positions.get(key)?;
        self.view.binary_search(&position).ok()
    }

    /// Keys of the view rows, in order.
    pub fn view_keys(&self) -> Vec<&str> {
        self.view
            .iter()
            .map(|&position| self.items[position].key())
            .collect()
    }

    /// Drop `key` from the view only. The full set is unchanged.
    ///
    /// Returns `true` if the key was visible.
    pub fn hide(&mut self, key: &str) -> bool {
        match self.row_of(key) {
            Some(row) => {
                self.view.remove(row);
                true
            }
            None => false,
        }
    }

    /// Delete an item from the full set (and therefore from the view).
    pub fn remove(&mut self, key: &str) -> Option<Arc<T>> {
        let position = self.positions.remove(key)?;
        let item = self.items.remove(position);

        for later in &self.items[position..] {
            if let Some(slot) = self.positions.get_mut(later.key()) {
                *slot -= 1;
            }
        }

        self.view.retain(|&p| p != position);
        for p in &mut self.view {
            if *p > position {
                *p -= 1;
            }
        }
        Some(item)
    }
}

impl<T> std::fmt::Debug for ItemStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemStore")
            .field("items", &self.items.len())
            .field("rows", &self.view.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::LoadError;

    struct Key(&'static str);

    impl Item for Key {
        type Icon = ();

        fn key(&self) -> &str {
            self.0
        }

        fn load_name(&self) -> Result<String, LoadError> {
            Ok(self.0.to_uppercase())
        }

        fn load_icon(&self) -> Result<(), LoadError> {
            Ok(())
        }
    }

    fn store(keys: &[&'static str]) -> ItemStore<Key> {
        let mut store = ItemStore::new();
        for key in keys {
            store.push(Arc::new(Key(key)));
            store.show_last();
        }
        store
    }

    #[test]
    fn test_push_rejects_duplicates() {
        let mut store = store(&["a", "b"]);
        assert_eq!(store.push(Arc::new(Key("a"))), None);
        assert_eq!(store.push(Arc::new(Key("c"))), Some(2));
        assert_eq!(store.len(), 3);
        assert_eq!(store.row_count(), 2);
    }

    #[test]
    fn test_view_rows_map_to_items() {
        let mut store = store(&["a", "b", "c", "d"]);
        assert!(store.set_view(vec![1, 3]));
        assert!(!store.set_view(vec![1, 3]));

        assert_eq!(store.view_keys(), vec!["b", "d"]);
        assert_eq!(store.row(1).map(|item| item.key()), Some("d"));
        assert_eq!(store.row_of("d"), Some(1));
        assert_eq!(store.row_of("a"), None);
        assert!(store.row(2).is_none());
    }

    #[test]
    fn test_hide_leaves_full_set() {
        let mut store = store(&["a", "b", "c"]);
        assert!(store.hide("b"));
        assert!(!store.hide("b"));

        assert_eq!(store.view_keys(), vec!["a", "c"]);
        assert!(store.contains("b"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_remove_reindexes_view() {
        let mut store = store(&["a", "b", "c", "d"]);
        store.set_view(vec![0, 2, 3]);

        assert!(store.remove("b").is_some());
        assert_eq!(store.view_keys(), vec!["a", "c", "d"]);
        assert_eq!(store.row_of("d"), Some(2));
        assert_eq!(store.get("c").map(|item| item.key()), Some("c"));

        assert!(store.remove("c").is_some());
        assert_eq!(store.view_keys(), vec!["a", "d"]);
        assert!(store.remove("zz").is_none());
    }
}
