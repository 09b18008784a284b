//! Lazily-evicting TTL map shared by every proxy cache.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::observability::metrics;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A concurrent map whose entries vanish a fixed time after insertion.
///
/// The lifetime is chosen per insert, so a reloaded TTL applies to the next
/// write without rebuilding the cache. Expired entries are removed when a
/// reader trips over them; there is no background sweep. Cloning shares the
/// underlying map.
pub struct TtlCache<K, V> {
    /// Label used for metrics and logs.
    name: &'static str,
    inner: Arc<DashMap<K, Entry<V>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(DashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up a live entry.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.get_at(key, Instant::now())
    }

    /// Look up an entry as seen at `now`.
    pub fn get_at<Q>(&self, key: &Q, now: Instant) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let hit = match self.inner.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => None,
            None => {
                metrics::record_cache_lookup(self.name, false);
                return None;
            }
        };

        if hit.is_none() {
            // Only drop the entry if nobody replaced it in the meantime.
            self.inner.remove_if(key, |_, entry| now >= entry.expires_at);
            metrics::record_cache_size(self.name, self.inner.len());
        }
        metrics::record_cache_lookup(self.name, hit.is_some());
        hit
    }

    /// Insert or replace an entry, expiring `ttl` from now.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        self.insert_at(key, value, ttl, Instant::now());
    }

    /// Insert or replace an entry, expiring `ttl` from `now`.
    pub fn insert_at(&self, key: K, value: V, ttl: Duration, now: Instant) {
        let Some(expires_at) = now.checked_add(ttl) else {
            tracing::warn!(cache = self.name, ttl = ?ttl, "TTL overflows the clock, entry not stored");
            return;
        };
        self.inner.insert(key, Entry { value, expires_at });
        metrics::record_cache_size(self.name, self.inner.len());
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
