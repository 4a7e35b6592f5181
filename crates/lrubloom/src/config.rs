//! Cache configuration and defaulting rules

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Defaults applied to unset or out-of-range configuration values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheDefaults {
    /// Exact-store capacity when none (or zero) is configured
    pub capacity: usize,
    /// Exact-store lifetime; zero means entries never expire
    pub ttl: Duration,
    /// Lifetime used by [`LruBloom::with_defaults`] when TTL is requested
    ///
    /// [`LruBloom::with_defaults`]: crate::LruBloom::with_defaults
    pub enabled_ttl: Duration,
    /// Filter sizing: expected number of distinct keys
    pub expected_items: usize,
    /// Filter sizing: target false positive probability
    pub false_positive_rate: f64,
}

impl CacheDefaults {
    /// The stock defaults
    pub const STANDARD: CacheDefaults = CacheDefaults {
        capacity: 1000,
        ttl: Duration::ZERO,
        enabled_ttl: Duration::from_secs(5 * 60),
        expected_items: 10_000,
        false_positive_rate: 0.01,
    };
}

impl Default for CacheDefaults {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Exact (LRU) layer options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactConfig {
    /// Whether the layer is built at all
    pub enabled: bool,
    /// Maximum resident entries; `0` selects the default
    pub capacity: usize,
    /// Uniform entry lifetime; zero disables expiry
    ///
    /// Serialized as a human-readable string such as `"150ms"` or `"5m"`.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl ExactConfig {
    /// Exact layer turned off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the uniform lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub(crate) fn resolve(self, defaults: &CacheDefaults) -> Self {
        if self.capacity == 0 {
            warn!(default = defaults.capacity, "exact capacity unset, using default");
            return Self {
                capacity: defaults.capacity,
                ..self
            };
        }
        self
    }
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: CacheDefaults::STANDARD.capacity,
            ttl: CacheDefaults::STANDARD.ttl,
        }
    }
}

/// Probabilistic (Bloom) layer options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Whether the layer is built at all
    pub enabled: bool,
    /// Expected distinct keys; `0` selects the default
    pub expected_items: usize,
    /// Target false positive probability; must lie in (0, 1)
    pub false_positive_rate: f64,
}

impl FilterConfig {
    /// Filter layer turned off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the expected key count
    pub fn with_expected_items(mut self, expected_items: usize) -> Self {
        self.expected_items = expected_items;
        self
    }

    /// Set the target false positive rate
    pub fn with_false_positive_rate(mut self, rate: f64) -> Self {
        self.false_positive_rate = rate;
        self
    }

    pub(crate) fn resolve(self, defaults: &CacheDefaults) -> Self {
        let mut resolved = self;
        if resolved.expected_items == 0 {
            warn!(default = defaults.expected_items, "filter expected_items unset, using default");
            resolved.expected_items = defaults.expected_items;
        }
        let rate = resolved.false_positive_rate;
        if !(rate.is_finite() && rate > 0.0 && rate < 1.0) {
            warn!(
                configured = rate,
                default = defaults.false_positive_rate,
                "filter false_positive_rate out of range, using default"
            );
            resolved.false_positive_rate = defaults.false_positive_rate;
        }
        resolved
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expected_items: CacheDefaults::STANDARD.expected_items,
            false_positive_rate: CacheDefaults::STANDARD.false_positive_rate,
        }
    }
}

/// Both layers together, e.g. as loaded from a JSON file
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// LRU layer
    pub exact: ExactConfig,
    /// Bloom layer
    pub filter: FilterConfig,
}
