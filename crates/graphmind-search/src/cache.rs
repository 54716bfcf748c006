use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Bounded, approximately-LRU embedding cache keyed by entity identifier.
///
/// `DashMap` for entries plus a separate access-order structure guarded by
/// a lock, tracking recency instead of frequency so eviction favors the
/// least-recently-used entry.
/// Concurrent get/put may race on which entry gets evicted first, but a
/// reader either observes a complete vector of the declared dimension or a
/// cache miss — never a corrupt/partial entry, since `DashMap` entries are
/// replaced atomically.
pub struct EmbeddingCache {
    entries: DashMap<String, Vec<f32>>,
    order: Mutex<VecDeque<String>>,
    capacity: usize,
    dimension: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl EmbeddingCache {
    pub fn new(capacity: usize, dimension: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            dimension,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// A hit always returns a vector of the declared embedding dimension;
    /// if the client's declared dimension changed underneath us, the stale
    /// entry is evicted and the call counts as a miss instead of returning
    /// a mismatched vector.
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        match self.entries.get(key) {
            Some(entry) if entry.len() == self.dimension => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.touch(key);
                Some(entry.clone())
            }
            Some(_) => {
                drop(self.entries.get(key));
                self.evict(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: impl Into<String>, vector: Vec<f32>) {
        if vector.len() != self.dimension {
            return;
        }
        let key = key.into();
        self.entries.insert(key.clone(), vector);
        self.touch(&key);
        self.evict_if_over_capacity();
    }

    /// After `evict(id)`, the next lookup for `id` is a miss.
    pub fn evict(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        let mut order = self.order.lock();
        order.retain(|k| k != key);
    }

    fn touch(&self, key: &str) {
        let mut order = self.order.lock();
        order.retain(|k| k != key);
        order.push_back(key.to_string());
    }

    fn evict_if_over_capacity(&self) {
        while self.entries.len() > self.capacity {
            let oldest = {
                let mut order = self.order.lock();
                order.pop_front()
            };
            match oldest {
                Some(key) => {
                    if self.entries.remove(&key).is_some() {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => break,
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
