//! Notifications emitted by an [`AppList`](crate::list::AppList).

/// Something the presentation layer may want to react to.
///
/// Events are emitted on the thread that drives the list, after the state
/// change they describe has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    /// Every name scheduled so far has been resolved. Emitted once.
    AllNamesLoaded,
    /// A row received newly resolved attributes and should be redrawn.
    RowUpdated {
        /// View row at the time of delivery.
        row: usize,
        /// Key of the item shown in that row.
        key: String,
    },
    /// The view was recomputed or an item was added to or removed from it.
    ViewChanged {
        /// Row count after the change.
        rows: usize,
    },
    /// The user activated the item with this key.
    ItemActivated {
        /// Key of the activated item.
        key: String,
    },
}

impl ListEvent {
    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AllNamesLoaded => "all_names_loaded",
            Self::RowUpdated { .. } => "row_updated",
            Self::ViewChanged { .. } => "view_changed",
            Self::ItemActivated { .. } => "item_activated",
        }
    }
}
