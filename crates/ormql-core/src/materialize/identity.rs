//! Per-materialization identity map.

use std::num::NonZeroUsize;

use lru::LruCache;
use ormql_proto::Value;
use tracing::debug;

use super::entity::EntityRef;
use crate::config::IdentityCacheConfig;

/// Identity of a keyed entity: its type and key values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub entity: String,
    pub key: Vec<Value>,
}

impl IdentityKey {
    pub fn new(entity: impl Into<String>, key: Vec<Value>) -> Self {
        Self {
            entity: entity.into(),
            key,
        }
    }
}

/// Counters for one identity cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub growths: u64,
    pub capacity: usize,
    pub len: usize,
}

/// LRU map from `(type, key)` to the canonical instance.
///
/// One cache lives for exactly one materialization pass. When enough
/// accesses have been seen and the eviction ratio since the last check is
/// above the configured threshold, capacity doubles up to `max_capacity`.
pub struct IdentityCache {
    entries: LruCache<IdentityKey, EntityRef>,
    config: IdentityCacheConfig,
    /// Accesses and evictions since the last growth check.
    window_accesses: u64,
    window_evictions: u64,
    stats: IdentityCacheStats,
}

impl IdentityCache {
    pub fn new(config: IdentityCacheConfig) -> Self {
        let capacity = non_zero(config.initial_capacity);
        Self {
            entries: LruCache::new(capacity),
            config,
            window_accesses: 0,
            window_evictions: 0,
            stats: IdentityCacheStats {
                capacity: capacity.get(),
                ..Default::default()
            },
        }
    }

    /// Cache that never grows beyond `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(IdentityCacheConfig::fixed(capacity))
    }

    /// Look up an instance, marking it most recently used.
    pub fn get(&mut self, key: &IdentityKey) -> Option<EntityRef> {
        self.window_accesses += 1;
        let found = self.entries.get(key).cloned();
        if found.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        self.maybe_grow();
        found
    }

    /// Insert an instance, evicting the least recently used one when full.
    pub fn insert(&mut self, key: IdentityKey, entity: EntityRef) {
        self.window_accesses += 1;
        if let Some((evicted, _)) = self.entries.push(key.clone(), entity) {
            if evicted != key {
                self.window_evictions += 1;
                self.stats.evictions += 1;
            }
        }
        self.maybe_grow();
    }

    /// Return the cached instance for `key`, or create and cache one.
    ///
    /// The flag is `true` when the instance was created by this call.
    pub fn get_or_insert_with(
        &mut self,
        key: IdentityKey,
        create: impl FnOnce() -> EntityRef,
    ) -> (EntityRef, bool) {
        if let Some(existing) = self.get(&key) {
            return (existing, false);
        }
        let entity = create();
        self.insert(key, entity.clone());
        (entity, true)
    }

    fn maybe_grow(&mut self) {
        if self.window_accesses < self.config.min_accesses_before_growth {
            return;
        }

        let ratio = self.window_evictions as f64 / self.window_accesses as f64;
        let capacity = self.entries.cap().get();
        if ratio > self.config.growth_eviction_ratio && capacity < self.config.max_capacity {
            let grown = capacity.saturating_mul(2).min(self.config.max_capacity);
            self.entries.resize(non_zero(grown));
            self.stats.growths += 1;
            self.stats.capacity = grown;
            debug!(from = capacity, to = grown, ratio, "identity cache grown");
        }

        self.window_accesses = 0;
        self.window_evictions = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn stats(&self) -> IdentityCacheStats {
        IdentityCacheStats {
            len: self.entries.len(),
            ..self.stats
        }
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new(IdentityCacheConfig::default())
    }
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}
