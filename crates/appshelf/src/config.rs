//! Engine configuration.
//!
//! [`ListConfig`] can be built in code with the `with_*` methods or loaded
//! from a TOML document. Missing fields take their defaults.
//!
//! ```
//! use appshelf::config::ListConfig;
//!
//! let config = ListConfig::from_toml_str(
//!     r#"
//!     icon_workers = 4
//!     icon_cache_capacity = 512
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.icon_workers, 4);
//! assert_eq!(config.name_workers, 3);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ListError, ListResult};

/// Upper bound on the worker count of either resolver pool.
pub const MAX_WORKERS: usize = 64;

/// Tunables for an [`AppList`](crate::list::AppList).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Concurrent name resolutions.
    pub name_workers: usize,
    /// Concurrent icon resolutions.
    pub icon_workers: usize,
    /// Maximum number of cached names.
    pub name_cache_capacity: usize,
    /// Maximum number of cached icons.
    pub icon_cache_capacity: usize,
    /// Delay between activating a row and dropping it from the view.
    pub removal_delay_ms: u64,
    /// Prefix for resolver thread names.
    pub thread_name_prefix: String,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            name_workers: 3,
            icon_workers: 3,
            name_cache_capacity: 4096,
            icon_cache_capacity: 256,
            removal_delay_ms: 500,
            thread_name_prefix: "appshelf".to_string(),
        }
    }
}

impl ListConfig {
    /// Parse a configuration from TOML and validate it.
    pub fn from_toml_str(text: &str) -> ListResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the name pool size.
    pub fn with_name_workers(mut self, workers: usize) -> Self {
        self.name_workers = workers;
        self
    }

    /// Set the icon pool size.
    pub fn with_icon_workers(mut self, workers: usize) -> Self {
        self.icon_workers = workers;
        self
    }

    /// Set the name cache capacity.
    pub fn with_name_cache_capacity(mut self, capacity: usize) -> Self {
        self.name_cache_capacity = capacity;
        self
    }

    /// Set the icon cache capacity.
    pub fn with_icon_cache_capacity(mut self, capacity: usize) -> Self {
        self.icon_cache_capacity = capacity;
        self
    }

    /// Set the deferred row removal delay.
    pub fn with_removal_delay(mut self, delay: Duration) -> Self {
        self.removal_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the resolver thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// The deferred row removal delay.
    pub fn removal_delay(&self) -> Duration {
        Duration::from_millis(self.removal_delay_ms)
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> ListResult<()> {
        for (field, workers) in [
            ("name_workers", self.name_workers),
            ("icon_workers", self.icon_workers),
        ] {
            if !(1..=MAX_WORKERS).contains(&workers) {
                return Err(ListError::Config(format!(
                    "{field} must be between 1 and {MAX_WORKERS}, got {workers}"
                )));
            }
        }
        for (field, capacity) in [
            ("name_cache_capacity", self.name_cache_capacity),
            ("icon_cache_capacity", self.icon_cache_capacity),
        ] {
            if capacity == 0 {
                return Err(ListError::Config(format!("{field} must be at least 1")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ListConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.removal_delay(), Duration::from_millis(500));
        assert_eq!((config.name_workers, config.icon_workers), (3, 3));
    }

    #[test]
    fn test_builders() {
        let config = ListConfig::default()
            .with_name_workers(1)
            .with_icon_workers(6)
            .with_name_cache_capacity(10)
            .with_icon_cache_capacity(2)
            .with_removal_delay(Duration::from_millis(25))
            .with_thread_name_prefix("shelf");

        assert_eq!(config.name_workers, 1);
        assert_eq!(config.icon_workers, 6);
        assert_eq!(config.name_cache_capacity, 10);
        assert_eq!(config.icon_cache_capacity, 2);
        assert_eq!(config.removal_delay_ms, 25);
        assert_eq!(config.thread_name_prefix, "shelf");
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = ListConfig::default().with_icon_workers(0).validate().unwrap_err();
        assert!(err.to_string().contains("icon_workers"));

        let err = ListConfig::default().with_name_workers(65).validate().unwrap_err();
        assert!(err.to_string().contains("name_workers"));

        let err = ListConfig::default().with_name_cache_capacity(0).validate().unwrap_err();
        assert!(matches!(err, ListError::Config(_)));
    }

    #[test]
    fn test_from_toml_fills_defaults() {
        let config = ListConfig::from_toml_str("removal_delay_ms = 100\nthread_name_prefix = \"x\"").unwrap();
        assert_eq!(config.removal_delay_ms, 100);
        assert_eq!(config.thread_name_prefix, "x");
        assert_eq!(config.icon_cache_capacity, 256);

        let empty = ListConfig::from_toml_str("").unwrap();
        assert_eq!(empty, ListConfig::default());
    }

    #[test]
    fn test_from_toml_errors() {
        assert!(matches!(
            ListConfig::from_toml_str("name_workers = \"many\""),
            Err(ListError::ConfigParse(_))
        ));
        assert!(matches!(
            ListConfig::from_toml_str("name_workers = 0"),
            Err(ListError::Config(_))
        ));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = ListConfig::default().with_icon_workers(5);
        let text = toml::to_string(&config).unwrap();
        assert_eq!(ListConfig::from_toml_str(&text).unwrap(), config);
    }
}
