//! Tag-indexed TTL store.
//!
//! One store per provider client. The key index and the tag reverse index
//! sit behind a single lock so no reader ever observes one updated without
//! the other.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "contentgate_cache_hit_total";
const METRIC_MISS: &str = "contentgate_cache_miss_total";
const METRIC_EXPIRED: &str = "contentgate_cache_expired_total";
const METRIC_EVICT: &str = "contentgate_cache_evict_total";
const METRIC_INVALIDATED: &str = "contentgate_cache_invalidated_total";

/// Stored value with its absolute expiry and tags. Never mutated; a
/// refresh is a delete followed by an insert.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: OffsetDateTime,
    tags: BTreeSet<String>,
}

struct Indices<V> {
    entries: LruCache<String, CacheEntry<V>>,
    by_tag: HashMap<String, HashSet<String>>,
    /// Bumped by every explicit removal, including no-op ones.
    generation: u64,
}

impl<V> Indices<V> {
    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn link(&mut self, key: &str, tags: &BTreeSet<String>) {
        for tag in tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    fn unlink(&mut self, key: &str, tags: &BTreeSet<String>) {
        for tag in tags {
            if let Some(keys) = self.by_tag.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.unlink(key, &entry.tags);
                true
            }
            None => false,
        }
    }
}

/// In-memory key/value store with lazy TTL expiry and tag invalidation.
///
/// Reads hold the shared lock. Writers (`set`, `delete`, tag invalidation,
/// and a read that finds an expired entry) take the exclusive lock.
/// Capacity overflow evicts the least recently written entry.
///
/// Fills that race with invalidation go through [`TaggedCache::generation`]
/// and [`TaggedCache::set_if_unchanged`]: a value fetched before a removal
/// is dropped instead of stored.
pub struct TaggedCache<V> {
    label: &'static str,
    inner: RwLock<Indices<V>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TaggedCache<V> {
    /// Create a store for `label` (the provider name used in metrics).
    pub fn new(label: &'static str, config: &CacheConfig) -> Self {
        Self::with_clock(label, config, Arc::new(SystemClock))
    }

    pub fn with_clock(label: &'static str, config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            label,
            inner: RwLock::new(Indices {
                entries: LruCache::new(config.max_entries_non_zero()),
                by_tag: HashMap::new(),
                generation: 0,
            }),
            clock,
        }
    }

    /// Return the live value under `key`; expired entries are dropped and
    /// reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let guard = rw_read(&self.inner, SOURCE, "get");
            match guard.entries.peek(key) {
                Some(entry) if now < entry.expires_at => {
                    counter!(METRIC_HIT, "provider" => self.label).increment(1);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    counter!(METRIC_MISS, "provider" => self.label).increment(1);
                    return None;
                }
            }
        }

        let mut guard = rw_write(&self.inner, SOURCE, "get.expire");
        // A writer may have refreshed the key between the two locks.
        if let Some(entry) = guard.entries.peek(key) {
            if now < entry.expires_at {
                counter!(METRIC_HIT, "provider" => self.label).increment(1);
                return Some(entry.value.clone());
            }
        }
        if guard.remove(key) {
            counter!(METRIC_EXPIRED, "provider" => self.label).increment(1);
            debug!(provider = self.label, key, "Dropped expired cache entry");
        }
        counter!(METRIC_MISS, "provider" => self.label).increment(1);
        None
    }

    /// Store `value` for `ttl` and register it under every tag.
    pub fn set<I>(&self, key: impl Into<String>, value: V, ttl: Duration, tags: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let entry = self.entry(value, ttl, tags);
        let mut guard = rw_write(&self.inner, SOURCE, "set");
        self.insert(&mut guard, key.into(), entry);
    }

    /// Current removal generation. Capture it before fetching a value that
    /// will be passed to [`TaggedCache::set_if_unchanged`].
    pub fn generation(&self) -> u64 {
        rw_read(&self.inner, SOURCE, "generation").generation
    }

    /// Like [`TaggedCache::set`], but only when no delete, tag invalidation
    /// or clear happened since `generation` was read. Returns whether the
    /// value was stored.
    pub fn set_if_unchanged<I>(
        &self,
        generation: u64,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
        tags: I,
    ) -> bool
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let entry = self.entry(value, ttl, tags);
        let mut guard = rw_write(&self.inner, SOURCE, "set_if_unchanged");
        if guard.generation != generation {
            debug!(provider = self.label, "Skipped cache fill raced by invalidation");
            return false;
        }
        self.insert(&mut guard, key.into(), entry);
        true
    }

    fn entry<I>(&self, value: V, ttl: Duration, tags: I) -> CacheEntry<V>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        CacheEntry {
            value,
            expires_at: self.expiry(ttl),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Absolute expiry for `ttl`, saturating at the latest representable
    /// instant.
    fn expiry(&self, ttl: Duration) -> OffsetDateTime {
        let now = self.clock.now();
        time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
    }

    fn insert(&self, guard: &mut Indices<V>, key: String, entry: CacheEntry<V>) {
        guard.remove(&key);
        let linked = entry.tags.clone();
        if let Some((evicted_key, evicted)) = guard.entries.push(key.clone(), entry) {
            guard.unlink(&evicted_key, &evicted.tags);
            counter!(METRIC_EVICT, "provider" => self.label).increment(1);
        }
        guard.link(&key, &linked);
    }

    /// Remove a single key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut guard = rw_write(&self.inner, SOURCE, "delete");
        guard.bump();
        guard.remove(key)
    }

    /// Remove every entry carrying at least one of `tags`. Returns the
    /// number of entries removed; unknown tags are a no-op.
    pub fn invalidate_by_tags<I>(&self, tags: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut guard = rw_write(&self.inner, SOURCE, "invalidate_by_tags");
        guard.bump();
        let mut doomed: HashSet<String> = HashSet::new();
        for tag in tags {
            if let Some(keys) = guard.by_tag.get(tag.as_ref()) {
                doomed.extend(keys.iter().cloned());
            }
        }

        let mut removed = 0;
        for key in &doomed {
            if guard.remove(key) {
                removed += 1;
            }
        }
        if removed > 0 {
            counter!(METRIC_INVALIDATED, "provider" => self.label).increment(removed as u64);
        }
        removed
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut guard = rw_write(&self.inner, SOURCE, "clear");
        guard.bump();
        let removed = guard.entries.len();
        guard.entries.clear();
        guard.by_tag.clear();
        if removed > 0 {
            counter!(METRIC_INVALIDATED, "provider" => self.label).increment(removed as u64);
        }
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        rw_read(&self.inner, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let guard = rw_read(&self.inner, SOURCE, "assert_consistent");
        for (key, entry) in guard.entries.iter() {
            for tag in &entry.tags {
                assert!(
                    guard.by_tag.get(tag).is_some_and(|keys| keys.contains(key)),
                    "key `{key}` missing from tag `{tag}`"
                );
            }
        }
        for (tag, keys) in &guard.by_tag {
            assert!(!keys.is_empty(), "empty tag bucket `{tag}`");
            for key in keys {
                let entry = guard.entries.peek(key);
                assert!(
                    entry.is_some_and(|entry| entry.tags.contains(tag)),
                    "tag `{tag}` points at missing key `{key}`"
                );
            }
        }
    }
}
