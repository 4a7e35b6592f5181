//! Exact store: bounded LRU map with optional per-entry expiry

use std::hash::Hash;
use std::time::{Duration, Instant};
use parking_lot::RwLock;

use crate::lru::LruCache;

/// Eviction policy, fixed when the store is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Capacity-bounded LRU, entries never expire on their own
    Plain,
    /// Capacity-bounded LRU plus a uniform lifetime, checked lazily on access
    WithTtl(Duration),
}

impl ExpiryPolicy {
    /// `Plain` for a zero duration, `WithTtl` otherwise
    pub fn from_ttl(ttl: Duration) -> Self {
        if ttl.is_zero() {
            ExpiryPolicy::Plain
        } else {
            ExpiryPolicy::WithTtl(ttl)
        }
    }

    fn ttl(self) -> Option<Duration> {
        match self {
            ExpiryPolicy::Plain => None,
            ExpiryPolicy::WithTtl(ttl) => Some(ttl),
        }
    }
}

struct Slot<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Slot<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

/// Outcome of a lookup against the exact store
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lookup<V> {
    Hit(V),
    /// Entry was present but past its deadline; it has been reaped
    Expired,
    Miss,
}

/// Thread-safe bounded key/value store with LRU eviction.
///
/// Every entry carries its own optional deadline. Under
/// [`ExpiryPolicy::WithTtl`] the deadline defaults to insertion time plus
/// the store lifetime; an explicit per-call lifetime overrides it under
/// either policy. Expired entries are invisible to reads and are removed
/// the next time they are touched, or by [`ExactStore::purge_expired`].
pub struct ExactStore<K, V> {
    entries: RwLock<LruCache<K, Slot<V>>>,
    policy: ExpiryPolicy,
}

impl<K, V> ExactStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a store holding at most `capacity` entries.
    ///
    /// A zero `ttl` selects [`ExpiryPolicy::Plain`].
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            policy: ExpiryPolicy::from_ttl(ttl),
        }
    }

    /// Insert or replace `key`, refreshing its recency and deadline.
    ///
    /// `ttl` overrides the store lifetime for this entry; `None` or a zero
    /// duration falls back to the policy default. Returns `true` when
    /// another entry was evicted to make room.
    pub fn insert(&self, key: K, value: V, ttl: Option<Duration>) -> bool {
        let lifetime = ttl.filter(|d| !d.is_zero()).or(self.policy.ttl());
        let expires_at = lifetime.and_then(|d| Instant::now().checked_add(d));

        self.entries
            .write()
            .put(key, Slot { value, expires_at })
            .is_some()
    }

    /// Look up a live value, promoting it to most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        match self.lookup(key) {
            Lookup::Hit(value) => Some(value),
            Lookup::Expired | Lookup::Miss => None,
        }
    }

    pub(crate) fn lookup(&self, key: &K) -> Lookup<V> {
        let now = Instant::now();
        let mut entries = self.entries.write();

        match entries.get(key) {
            Some(slot) if slot.is_live(now) => return Lookup::Hit(slot.value.clone()),
            Some(_) => {}
            None => return Lookup::Miss,
        }

        entries.remove(key);
        Lookup::Expired
    }

    /// Whether `key` holds a live entry. Does not touch recency.
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .peek(key)
            .is_some_and(|slot| slot.is_live(now))
    }

    /// Remove `key`, returning whether it held a live entry
    pub fn remove(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .write()
            .remove(key)
            .is_some_and(|slot| slot.is_live(now))
    }

    /// Live keys, most recently used first
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        self.entries
            .read()
            .iter()
            .filter(|(_, slot)| slot.is_live(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Every resident key, including expired entries not yet reaped
    pub(crate) fn resident_keys(&self) -> Vec<K> {
        self.entries
            .read()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Remove the listed keys that are expired right now, in one write.
    ///
    /// Keys refreshed since they were observed stale are left alone.
    pub(crate) fn reap(&self, keys: &[K]) -> usize {
        if keys.is_empty() {
            return 0;
        }

        let now = Instant::now();
        let mut entries = self.entries.write();
        let mut reaped = 0;
        for key in keys {
            let expired = entries.peek(key).is_some_and(|slot| !slot.is_live(now));
            if expired {
                entries.remove(key);
                reaped += 1;
            }
        }
        reaped
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let stale: Vec<K> = entries
            .iter()
            .filter(|(_, slot)| !slot.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            entries.remove(key);
        }
        stale.len()
    }

    /// Number of resident entries (expired but unreaped entries included)
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no entries are resident
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum resident entries
    pub fn capacity(&self) -> usize {
        self.entries.read().capacity()
    }

    /// Policy chosen at construction
    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    /// Uniform lifetime, `None` for [`ExpiryPolicy::Plain`]
    pub fn ttl(&self) -> Option<Duration> {
        self.policy.ttl()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
