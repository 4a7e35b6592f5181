//! LruBloom: exact LRU store layered with a Bloom filter

use std::hash::Hash;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::bloom::BloomFilter;
use crate::config::{CacheConfig, CacheDefaults, ExactConfig, FilterConfig};
use crate::error::{Error, Result};
use crate::exact::{ExactStore, Lookup};
use crate::key::CacheKey;
use crate::stats::CacheStats;

/// Swappable filter plus the sizing needed to recreate it
struct FilterLayer {
    /// Current filter. Inserts and tests share the read lock; only a swap
    /// takes the write lock.
    current: RwLock<Arc<BloomFilter>>,
    expected_items: usize,
    false_positive_rate: f64,
    /// Set while a rebuild scans the exact store
    journaling: AtomicBool,
    /// Canonical keys inserted while `journaling` was set
    journal: Mutex<Vec<Vec<u8>>>,
}

impl FilterLayer {
    fn new(config: &FilterConfig) -> Self {
        let layer = Self {
            current: RwLock::new(Arc::new(BloomFilter::with_estimates(
                config.expected_items,
                config.false_positive_rate,
            ))),
            expected_items: config.expected_items,
            false_positive_rate: config.false_positive_rate,
            journaling: AtomicBool::new(false),
            journal: Mutex::new(Vec::new()),
        };
        let params = layer.current.read().params();
        debug!(
            expected_items = layer.expected_items,
            false_positive_rate = layer.false_positive_rate,
            size_bits = params.size_bits,
            hash_count = params.hash_count,
            "bloom layer sized"
        );
        layer
    }

    fn fresh(&self) -> BloomFilter {
        BloomFilter::with_estimates(self.expected_items, self.false_positive_rate)
    }

    fn insert(&self, bytes: &[u8]) {
        let current = self.current.read();
        current.insert(bytes);
        // Recorded under the read lock so a rebuild's swap sees it.
        if self.journaling.load(Ordering::SeqCst) {
            self.journal.lock().push(bytes.to_vec());
        }
    }

    fn contains(&self, bytes: &[u8]) -> bool {
        self.current.read().contains(bytes)
    }

    fn snapshot(&self) -> Arc<BloomFilter> {
        self.current.read().clone()
    }

    fn replace(&self, filter: BloomFilter) {
        *self.current.write() = Arc::new(filter);
    }
}

/// Hybrid cache composing an exact LRU store with a Bloom filter.
///
/// Writes go to every enabled layer. Reads ask the filter first: a
/// negative answer is final and the exact store is never touched. A
/// positive answer falls through to the exact store, which alone can
/// produce a value.
///
/// Deleting a key does not clear its filter bits, so `exists` may keep
/// reporting it until [`LruBloom::reset_bloom`] or
/// [`LruBloom::rebuild_bloom_from_lru`] runs.
///
/// All methods take `&self`; share the cache across threads with `Arc`.
pub struct LruBloom<K, V> {
    /// Exact layer, internally synchronized
    exact: Option<ExactStore<K, V>>,

    /// Probabilistic layer
    filter: Option<FilterLayer>,

    /// Serializes clear, reset and rebuild against one another
    maintenance: Mutex<()>,

    /// Cache statistics
    stats: CacheStats,
}

impl<K, V> LruBloom<K, V>
where
    K: CacheKey + Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache from the two layer configurations.
    ///
    /// Zero or out-of-range sizing values fall back to
    /// [`CacheDefaults::STANDARD`].
    ///
    /// # Errors
    /// [`Error::Configuration`] when both layers are disabled.
    pub fn new(exact: ExactConfig, filter: FilterConfig) -> Result<Self> {
        Self::with_config_defaults(exact, filter, &CacheDefaults::STANDARD)
    }

    /// Like [`LruBloom::new`], with a caller-supplied defaults record
    pub fn with_config_defaults(
        exact: ExactConfig,
        filter: FilterConfig,
        defaults: &CacheDefaults,
    ) -> Result<Self> {
        if !exact.enabled && !filter.enabled {
            return Err(Error::Configuration(
                "either the LRU or the Bloom layer must be enabled".to_string(),
            ));
        }
        Ok(Self::assemble(exact, filter, defaults))
    }

    /// Create a cache from an aggregate [`CacheConfig`]
    pub fn from_config(config: CacheConfig) -> Result<Self> {
        Self::new(config.exact, config.filter)
    }

    /// Both layers on with stock sizing. `enable_ttl` gives entries the
    /// default five-minute lifetime; otherwise they never expire.
    pub fn with_defaults(enable_ttl: bool) -> Self {
        let defaults = CacheDefaults::STANDARD;
        let ttl = if enable_ttl { defaults.enabled_ttl } else { Duration::ZERO };

        Self::assemble(
            ExactConfig::default().with_ttl(ttl),
            FilterConfig::default(),
            &defaults,
        )
    }

    fn assemble(exact: ExactConfig, filter: FilterConfig, defaults: &CacheDefaults) -> Self {
        let exact = exact.enabled.then(|| {
            let resolved = exact.resolve(defaults);
            debug!(
                capacity = resolved.capacity,
                ttl_ms = resolved.ttl.as_millis() as u64,
                "lru layer sized"
            );
            ExactStore::new(resolved.capacity, resolved.ttl)
        });
        let filter = filter
            .enabled
            .then(|| FilterLayer::new(&filter.resolve(defaults)));

        Self {
            exact,
            filter,
            maintenance: Mutex::new(()),
            stats: CacheStats::new(),
        }
    }

    /// Store `value` under `key` in every enabled layer
    pub fn set(&self, key: K, value: V) {
        self.store(key, value, None);
    }

    /// Store with a lifetime for this entry only, overriding the uniform TTL
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.store(key, value, Some(ttl));
    }

    fn store(&self, key: K, value: V, ttl: Option<Duration>) {
        self.stats.record_insert();

        let Some(exact) = &self.exact else {
            if let Some(filter) = &self.filter {
                filter.insert(&key.canonical_bytes());
            }
            return;
        };

        // The exact write must precede the filter write for rebuild journaling.
        let bytes = self
            .filter
            .as_ref()
            .map(|_| key.canonical_bytes().into_owned());

        if exact.insert(key, value, ttl) {
            self.stats.record_eviction();
        }

        if let (Some(filter), Some(bytes)) = (&self.filter, bytes) {
            filter.insert(&bytes);
        }
    }

    /// Fetch the value for `key`.
    ///
    /// A filter miss returns `None` without consulting the exact store.
    /// With the exact layer disabled this always returns `None`; use
    /// [`LruBloom::exists`] instead.
    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(filter) = &self.filter {
            if !filter.contains(&key.canonical_bytes()) {
                self.stats.record_rejection();
                self.stats.record_miss();
                return None;
            }
        }

        let lookup = match &self.exact {
            Some(exact) => exact.lookup(key),
            None => Lookup::Miss,
        };

        match lookup {
            Lookup::Hit(value) => {
                self.stats.record_hit();
                Some(value)
            }
            Lookup::Expired => {
                self.stats.record_expirations(1);
                self.stats.record_miss();
                None
            }
            Lookup::Miss => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Whether either layer reports `key`.
    ///
    /// Exact when only the LRU layer is enabled. Otherwise a live exact
    /// entry answers true and anything else defers to the filter, which may
    /// give a false positive (including for deleted keys).
    ///
    /// The exact store is peeked, not read: unlike [`get`](Self::get) this
    /// never promotes `key` in recency order, so polling `exists` does not
    /// keep an entry from being evicted.
    pub fn exists(&self, key: &K) -> bool {
        if self.exact.as_ref().is_some_and(|exact| exact.contains(key)) {
            return true;
        }
        self.filter
            .as_ref()
            .is_some_and(|filter| filter.contains(&key.canonical_bytes()))
    }

    /// Filter-only membership test; falls back to the exact store when the
    /// filter layer is disabled.
    pub fn might_contain(&self, key: &K) -> bool {
        match (&self.filter, &self.exact) {
            (Some(filter), _) => filter.contains(&key.canonical_bytes()),
            (None, Some(exact)) => exact.contains(key),
            (None, None) => false,
        }
    }

    /// Remove `key` from the exact store. Filter bits are left in place.
    pub fn delete(&self, key: &K) {
        if let Some(exact) = &self.exact {
            exact.remove(key);
        }
    }

    /// Empty the exact store and replace the filter with a fresh one
    pub fn clear(&self) {
        let _guard = self.maintenance.lock();

        // Filter first: a concurrent set that survives the exact clear then
        // lands in the fresh filter.
        self.reset_filter();
        if let Some(exact) = &self.exact {
            exact.clear();
        }
        debug!("cache cleared");
    }

    /// Replace the filter with an empty one of the configured size.
    /// No-op when the filter layer is disabled.
    pub fn reset_bloom(&self) {
        let _guard = self.maintenance.lock();
        self.reset_filter();
    }

    fn reset_filter(&self) {
        let Some(filter) = &self.filter else {
            return;
        };
        filter.replace(filter.fresh());
        self.stats.record_reset();
        debug!("bloom filter reset");
    }

    /// Repopulate a fresh filter from the live contents of the exact store
    /// and swap it in. No-op when the filter layer is disabled.
    ///
    /// Expired entries met during the scan are reaped. Keys written by
    /// concurrent `set` calls during the scan are journaled and folded into
    /// the new filter before the swap, so no key live across the rebuild is
    /// lost. A key deleted mid-rebuild may stay in the new filter.
    ///
    /// Without an exact layer the scan is empty, so the new filter holds
    /// only keys journaled during the call.
    pub fn rebuild_bloom_from_lru(&self) {
        let Some(filter) = &self.filter else {
            return;
        };
        let _guard = self.maintenance.lock();

        filter.journaling.store(true, Ordering::SeqCst);

        let rebuilt = filter.fresh();
        let mut stale = Vec::new();
        if let Some(exact) = &self.exact {
            for key in exact.resident_keys() {
                if exact.contains(&key) {
                    rebuilt.insert(&key.canonical_bytes());
                } else {
                    stale.push(key);
                }
            }
        }
        let kept = rebuilt.items_inserted();

        let reaped = self.exact.as_ref().map_or(0, |exact| exact.reap(&stale));
        self.stats.record_expirations(reaped as u64);

        let journaled = {
            let mut current = filter.current.write();
            let pending = mem::take(&mut *filter.journal.lock());
            for bytes in &pending {
                rebuilt.insert(bytes);
            }
            filter.journaling.store(false, Ordering::SeqCst);
            *current = Arc::new(rebuilt);
            pending.len()
        };

        self.stats.record_rebuild();
        info!(kept, reaped, journaled, "bloom filter rebuilt from lru");
    }

    /// The current filter, `None` when the filter layer is disabled.
    ///
    /// The handle is a snapshot: a later reset or rebuild swaps in a new
    /// filter without affecting it.
    pub fn bloom_client(&self) -> Option<Arc<BloomFilter>> {
        self.filter.as_ref().map(FilterLayer::snapshot)
    }

    /// The exact store, `None` when the LRU layer is disabled
    pub fn lru_client(&self) -> Option<&ExactStore<K, V>> {
        self.exact.as_ref()
    }

    /// Whether the LRU layer exists
    pub fn lru_enabled(&self) -> bool {
        self.exact.is_some()
    }

    /// Whether the Bloom layer exists
    pub fn bloom_enabled(&self) -> bool {
        self.filter.is_some()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn both(capacity: usize) -> LruBloom<String, String> {
        LruBloom::new(
            ExactConfig::default().with_capacity(capacity),
            FilterConfig::default().with_expected_items(1000),
        )
        .unwrap()
    }

    #[test]
    fn test_both_layers_basic() {
        let cache = both(500);

        cache.set("qmaru".to_string(), "best".to_string());

        assert_eq!(cache.get(&"qmaru".to_string()), Some("best".to_string()));
        assert!(cache.exists(&"qmaru".to_string()));
        let bloom = cache.bloom_client().unwrap();
        assert!(bloom.contains(b"qmaru"));
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_both_disabled_rejected() {
        let result =
            LruBloom::<String, u32>::new(ExactConfig::disabled(), FilterConfig::disabled());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_filter_rejection_counted() {
        let cache = both(10);

        assert_eq!(cache.get(&"never".to_string()), None);
        assert_eq!(cache.stats().rejections(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_lru_only() {
        let cache: LruBloom<&str, i32> =
            LruBloom::new(ExactConfig::default(), FilterConfig::disabled()).unwrap();

        cache.set("k", 1);

        assert!(cache.bloom_client().is_none());
        assert!(cache.lru_client().is_some());
        assert_eq!(cache.get(&"k"), Some(1));
        assert!(cache.exists(&"k"));
        assert!(!cache.exists(&"other"));
        assert!(cache.might_contain(&"k"));
    }

    #[test]
    fn test_bloom_only() {
        let cache: LruBloom<&str, &str> =
            LruBloom::new(ExactConfig::disabled(), FilterConfig::default()).unwrap();

        cache.set("bloom-key", "value-bloom");

        assert_eq!(cache.get(&"bloom-key"), None);
        assert!(cache.exists(&"bloom-key"));
        assert!(cache.might_contain(&"bloom-key"));
        assert!(cache.lru_client().is_none());
        assert!(cache.bloom_client().unwrap().contains(b"bloom-key"));
    }

    #[test]
    fn test_delete_keeps_filter_bits() {
        let cache = both(10);
        let key = "gone".to_string();

        cache.set(key.clone(), "v".to_string());
        cache.delete(&key);

        assert_eq!(cache.get(&key), None);
        // Filter still answers "possibly present"
        assert!(cache.exists(&key));
        assert!(cache.might_contain(&key));

        cache.rebuild_bloom_from_lru();
        assert!(!cache.might_contain(&key));
        assert!(!cache.exists(&key));
    }

    #[test]
    fn test_reset_bloom_drops_membership() {
        let cache = both(10);
        let key = "k".to_string();
        cache.set(key.clone(), "v".to_string());

        cache.reset_bloom();

        // Value is still resident but the filter now rejects it
        assert_eq!(cache.get(&key), None);
        assert_eq!(cache.lru_client().unwrap().get(&key), Some("v".to_string()));
        assert_eq!(cache.stats().resets(), 1);

        cache.rebuild_bloom_from_lru();
        assert_eq!(cache.get(&key), Some("v".to_string()));
    }

    #[test]
    fn test_reset_bloom_noop_without_filter() {
        let cache: LruBloom<u32, u32> =
            LruBloom::new(ExactConfig::default(), FilterConfig::disabled()).unwrap();
        cache.set(1, 1);
        cache.reset_bloom();
        cache.rebuild_bloom_from_lru();

        assert_eq!(cache.get(&1), Some(1));
        assert_eq!(cache.stats().resets(), 0);
        assert_eq!(cache.stats().rebuilds(), 0);
    }

    #[test]
    fn test_rebuild_filter_only_starts_empty() {
        let cache: LruBloom<String, String> =
            LruBloom::new(ExactConfig::disabled(), FilterConfig::default()).unwrap();
        cache.set("k".to_string(), "v".to_string());
        assert!(cache.might_contain(&"k".to_string()));

        cache.rebuild_bloom_from_lru();

        assert!(!cache.might_contain(&"k".to_string()));
        assert_eq!(cache.stats().rebuilds(), 1);
        assert_eq!(cache.stats().expirations(), 0);
        assert_eq!(cache.bloom_client().unwrap().items_inserted(), 0);
    }

    #[test]
    fn test_exists_does_not_promote() {
        let cache: LruBloom<u32, u32> =
            LruBloom::new(ExactConfig::default().with_capacity(2), FilterConfig::disabled())
                .unwrap();
        cache.set(1, 1);
        cache.set(2, 2);

        assert!(cache.exists(&1));
        cache.set(3, 3);

        // 1 was still least recent despite the exists call
        assert!(!cache.exists(&1));
        assert!(cache.exists(&2));
        assert!(cache.exists(&3));
    }

    #[test]
    fn test_clear() {
        let cache = both(10);
        for i in 0..5 {
            cache.set(format!("k{i}"), i.to_string());
        }

        cache.clear();

        assert!(cache.lru_client().unwrap().is_empty());
        assert_eq!(cache.bloom_client().unwrap().items_inserted(), 0);
        for i in 0..5 {
            assert!(!cache.exists(&format!("k{i}")));
        }
    }

    #[test]
    fn test_rebuild_reaps_expired() {
        let cache: LruBloom<u32, u32> = LruBloom::new(
            ExactConfig::default().with_ttl(Duration::from_millis(30)),
            FilterConfig::default(),
        )
        .unwrap();

        cache.set(1, 10);
        thread::sleep(Duration::from_millis(60));
        cache.set(2, 20);

        cache.rebuild_bloom_from_lru();

        assert_eq!(cache.lru_client().unwrap().len(), 1);
        assert_eq!(cache.stats().expirations(), 1);
        assert!(!cache.might_contain(&1));
        assert_eq!(cache.get(&2), Some(20));
    }

    #[test]
    fn test_per_call_ttl() {
        let cache = both(10);
        cache.set_with_ttl("short".to_string(), "v".to_string(), Duration::from_millis(20));
        cache.set("long".to_string(), "v".to_string());

        thread::sleep(Duration::from_millis(50));

        assert_eq!(cache.get(&"short".to_string()), None);
        assert_eq!(cache.get(&"long".to_string()), Some("v".to_string()));
        assert_eq!(cache.stats().expirations(), 1);
    }

    #[test]
    fn test_zero_sizing_uses_defaults() {
        let cache: LruBloom<u32, u32> = LruBloom::new(
            ExactConfig::default().with_capacity(0),
            FilterConfig::default()
                .with_expected_items(0)
                .with_false_positive_rate(-1.0),
        )
        .unwrap();

        assert_eq!(cache.lru_client().unwrap().capacity(), 1000);
        let expected = crate::bloom::BloomParams::optimal(10_000, 0.01);
        assert_eq!(cache.bloom_client().unwrap().params(), expected);
    }

    #[test]
    fn test_with_defaults() {
        let plain: LruBloom<String, u8> = LruBloom::with_defaults(false);
        assert_eq!(plain.lru_client().unwrap().ttl(), None);

        let expiring: LruBloom<String, u8> = LruBloom::with_defaults(true);
        assert_eq!(
            expiring.lru_client().unwrap().ttl(),
            Some(Duration::from_secs(300))
        );
        assert!(expiring.bloom_enabled() && expiring.lru_enabled());
    }

    #[test]
    fn test_eviction_counted() {
        let cache = both(2);
        for i in 0..3 {
            cache.set(i.to_string(), String::new());
        }
        assert_eq!(cache.stats().evictions(), 1);
        assert_eq!(cache.stats().inserts(), 3);
    }
}
