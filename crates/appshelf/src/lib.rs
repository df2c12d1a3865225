//! Concurrent attribute resolution and caching for large filterable lists.
//!
//! appshelf presents a large list of items (typically installed
//! applications) whose display attributes, a name and an icon, are expensive
//! to compute. It keeps the presentation thread responsive:
//!
//! - **Resolution**: names and icons are computed on two bounded resolver
//!   pools, never on the presentation thread
//! - **Caching**: resolved attributes live in bounded LRU caches shared
//!   between resolver threads and the presentation thread
//! - **Filtering**: a search pattern derives an order-preserving view over
//!   the full item set from whatever names are cached
//! - **Delivery**: every presentation-visible change is applied on a single
//!   sink owned by the presentation thread and reported as a [`ListEvent`]
//!
//! # Example
//!
//! ```
//! use appshelf::{AppList, Item, ListConfig, ListEvent, LoadError};
//! use std::time::Duration;
//!
//! struct App {
//!     package: &'static str,
//!     label: &'static str,
//! }
//!
//! impl Item for App {
//!     type Icon = Vec<u8>;
//!
//!     fn key(&self) -> &str {
//!         self.package
//!     }
//!
//!     fn load_name(&self) -> Result<String, LoadError> {
//!         Ok(self.label.to_string())
//!     }
//!
//!     fn load_icon(&self) -> Result<Vec<u8>, LoadError> {
//!         Ok(vec![0; 4])
//!     }
//! }
//!
//! let mut list = AppList::new(ListConfig::default()).unwrap();
//! let events = list.subscribe();
//!
//! list.register_all([
//!     App { package: "org.example.mail", label: "Mail" },
//!     App { package: "org.example.maps", label: "Maps" },
//! ]);
//!
//! // Draw row 0 now; a placeholder comes back if anything is missing.
//! let row = list.request_row(0).unwrap();
//! assert_eq!(row.key, "org.example.mail");
//!
//! // Drive the presentation loop until every name has arrived.
//! while !list.names_loaded() {
//!     list.wait_for_events(Duration::from_millis(10));
//! }
//! assert!(events.try_iter().any(|event| event == ListEvent::AllNamesLoaded));
//! ```

pub mod cache;
pub mod config;
mod error;
pub mod event;
pub mod filter;
pub mod item;
pub mod list;
pub mod resolve;
pub mod store;

pub use appshelf_core::{LoadProgress, Signal};
pub use cache::{AttributeCache, CacheStats};
pub use config::ListConfig;
pub use error::{ListError, ListResult};
pub use event::ListEvent;
pub use filter::SearchPattern;
pub use item::{AttributeKind, Item, LoadError};
pub use list::{AppList, RowSnapshot};
