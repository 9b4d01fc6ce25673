//! Router configuration.
//!
//! # Configuration Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `base_url` | `None` | Base for resolving relative visit targets |
//! | `history_capacity` | 50 | History entries retained in memory |
//! | `default_cache_for` | 30s | Prefetch entry lifetime when unspecified |
//! | `swap_before_history` | `true` | Commit the view before mutating history |
//!
//! # Examples
//!
//! ```
//! use glide_rs::RouterConfig;
//! use std::time::Duration;
//!
//! let config = RouterConfig {
//!     history_capacity: 100,
//!     default_cache_for: Duration::from_secs(60),
//!     ..Default::default()
//! };
//! assert_eq!(config.history_capacity, 100);
//! ```

use std::time::Duration;
use url::Url;

/// Configuration for a [`Router`](crate::Router) instance.
#[derive(Clone, Debug, PartialEq)]
pub struct RouterConfig {
    /// Base URL for resolving relative visit targets. Visits to relative
    /// URLs fail without one.
    pub base_url: Option<Url>,

    /// Maximum history entries retained in memory. Older entries are
    /// evicted least-recently-used; a back/forward lookup that misses
    /// falls back to a network re-fetch.
    pub history_capacity: usize,

    /// Lifetime applied to prefetch entries that don't specify their own.
    pub default_cache_for: Duration,

    /// Whether the render adapter commits before history is mutated, so a
    /// failed swap leaves history untouched.
    pub swap_before_history: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            base_url: None,
            history_capacity: crate::history::DEFAULT_CAPACITY,
            default_cache_for: crate::cache::DEFAULT_CACHE_FOR,
            swap_before_history: true,
        }
    }
}

impl RouterConfig {
    /// Default configuration with a base URL.
    #[must_use]
    pub fn with_base_url(base_url: Url) -> Self {
        RouterConfig {
            base_url: Some(base_url),
            ..Default::default()
        }
    }
}
