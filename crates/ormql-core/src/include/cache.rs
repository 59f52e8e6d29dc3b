//! Plan cache keyed by include shape.
//!
//! Planning only depends on the root entity, the dialect and the include
//! tree, so every query with the same shape reuses one [`SingleQueryPlan`]
//! regardless of its filter.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::planner::SingleQueryPlan;
use super::tree::IncludeTree;
use crate::stats::CacheStats;

/// Include-shape fingerprint for cache lookup.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IncludeFingerprint {
    hash: u64,
}

impl IncludeFingerprint {
    /// Fingerprint a resolved include tree for a dialect.
    ///
    /// Sibling order is significant since it decides alias numbering.
    pub fn new(dialect: &str, tree: &IncludeTree) -> Self {
        use std::collections::hash_map::DefaultHasher;

        let mut hasher = DefaultHasher::new();
        dialect.hash(&mut hasher);
        tree.hash(&mut hasher);

        Self {
            hash: hasher.finish(),
        }
    }

    pub fn value(&self) -> u64 {
        self.hash
    }
}

/// Cached plan with metadata.
#[derive(Debug)]
pub struct CachedPlan {
    /// The built plan.
    pub plan: Arc<SingleQueryPlan>,
    /// Dialect the plan was rendered for.
    pub dialect: String,
    /// Tree the plan was built from, compared on lookup.
    pub tree: IncludeTree,
    /// Number of cache hits for this plan.
    pub hit_count: AtomicU64,
}

impl CachedPlan {
    pub fn new(plan: Arc<SingleQueryPlan>, dialect: &str, tree: IncludeTree) -> Self {
        Self {
            plan,
            dialect: dialect.to_string(),
            tree,
            hit_count: AtomicU64::new(0),
        }
    }

    /// Increment the hit count and return the new value.
    pub fn record_hit(&self) -> u64 {
        self.hit_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn hits(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }

    fn matches(&self, dialect: &str, tree: &IncludeTree) -> bool {
        self.dialect == dialect && &self.tree == tree
    }
}

/// Thread-safe plan cache with least-hit eviction.
#[derive(Debug)]
pub struct PlanCache {
    cache: RwLock<HashMap<IncludeFingerprint, CachedPlan>>,
    max_entries: usize,
    stats: CacheStats,
}

impl PlanCache {
    /// Create a new plan cache holding at most `max_entries` plans.
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Get the cached plan for a tree, if any.
    pub fn get(&self, dialect: &str, tree: &IncludeTree) -> Option<Arc<SingleQueryPlan>> {
        let fingerprint = IncludeFingerprint::new(dialect, tree);
        let guard = self.cache.read();

        if let Some(cached) = guard.get(&fingerprint) {
            if cached.matches(dialect, tree) {
                let hits = cached.record_hit();
                self.stats.record_hit();
                trace!(root = %tree.root_entity, hits, "plan cache hit");
                return Some(Arc::clone(&cached.plan));
            }
        }

        self.stats.record_miss();
        None
    }

    /// Insert a plan, evicting the least-hit entry when full.
    pub fn insert(&self, dialect: &str, tree: IncludeTree, plan: Arc<SingleQueryPlan>) {
        let fingerprint = IncludeFingerprint::new(dialect, &tree);
        let mut guard = self.cache.write();

        if guard.len() >= self.max_entries && !guard.contains_key(&fingerprint) {
            self.evict_least_used(&mut guard);
        }

        guard.insert(fingerprint, CachedPlan::new(plan, dialect, tree));
    }

    /// Return the cached plan or build, cache and return a new one.
    pub fn get_or_try_insert<E>(
        &self,
        dialect: &str,
        tree: &IncludeTree,
        build: impl FnOnce() -> std::result::Result<SingleQueryPlan, E>,
    ) -> std::result::Result<Arc<SingleQueryPlan>, E> {
        if let Some(plan) = self.get(dialect, tree) {
            return Ok(plan);
        }

        let plan = Arc::new(build()?);
        self.insert(dialect, tree.clone(), Arc::clone(&plan));
        Ok(plan)
    }

    /// Drop every plan rooted at `root_entity`.
    pub fn invalidate(&self, root_entity: &str) -> usize {
        let mut guard = self.cache.write();
        let before = guard.len();
        guard.retain(|_, cached| cached.tree.root_entity != root_entity);
        let removed = before - guard.len();
        if removed > 0 {
            debug!(root = root_entity, removed, "plan cache invalidated");
        }
        removed
    }

    fn evict_least_used(&self, cache: &mut HashMap<IncludeFingerprint, CachedPlan>) {
        let evict_key = cache
            .iter()
            .min_by_key(|(_, v)| v.hits())
            .map(|(k, _)| *k);

        if let Some(key) = evict_key {
            if let Some(evicted) = cache.remove(&key) {
                self.stats.record_evictions(1);
                debug!(
                    root = %evicted.tree.root_entity,
                    hits = evicted.hits(),
                    "plan cache eviction"
                );
            }
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(256)
    }
}
