use crate::generator::Layout;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

/// A stored generation result
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub layout: Layout,
    pub created_at: Instant,
}

/// Memoizes whole layouts keyed by (grid signature, rule configuration,
/// request parameters).
///
/// The one structure shared across concurrent generation requests: the
/// interior mutex makes per-key reads and writes atomic. Two simultaneous
/// misses for the same key may both compute; the last insert wins, which is
/// harmless because identical inputs produce identical layouts. The store
/// is purely additive until `clear()` — no eviction is applied.
#[derive(Debug, Default)]
pub struct PlacementCache {
    entries: Mutex<HashMap<u64, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PlacementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a layout, recording a hit or miss.
    pub fn get(&self, key: u64) -> Option<Layout> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache hit");
                Some(entry.layout.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Store a layout. At most one entry per key; a concurrent writer for
    /// the same key simply replaces an identical layout.
    pub fn insert(&self, key: u64, layout: Layout) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key,
            CacheEntry {
                layout,
                created_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hits over total lookups; 0.0 before any lookup happens.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 { 0.0 } else { hits / total }
    }
}
