//! Bounded recency cache
//!
//! A small key → value cache with least-recently-used eviction. It backs the
//! route key → view id memory shared by every view tracker, so capacities are
//! tiny (default 10) and a linear scan over an ordered deque is the whole
//! implementation.

use std::borrow::Borrow;
use std::collections::VecDeque;

/// Default number of entries kept by a [`RecencyCache`]
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Key → value cache with strict LRU eviction.
///
/// Entries are kept in access order, least recently used at the front.
#[derive(Debug, Clone)]
pub struct RecencyCache<K, V> {
    entries: VecDeque<(K, V)>,
    capacity: usize,
}

impl<K: Eq, V> Default for RecencyCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl<K: Eq, V> RecencyCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            log::warn!("recency cache capacity must be at least 1, using 1");
            1
        } else {
            capacity
        };
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = self.position(key)?;
        let entry = self.entries.remove(index)?;
        self.entries.push_back(entry);
        self.entries.back().map(|(_, value)| value)
    }

    /// Look up `key` without touching its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries
            .iter()
            .find(|(k, _)| k.borrow() == key)
            .map(|(_, value)| value)
    }

    /// Insert or overwrite `key`, making it the most recently used entry.
    ///
    /// Inserting a new key into a full cache evicts the least recently used
    /// entry first.
    pub fn set(&mut self, key: K, value: V) {
        if let Some(index) = self.position(&key) {
            self.entries.remove(index);
        } else if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, value));
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.position(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries.iter().position(|(k, _)| k.borrow() == key)
    }
}
