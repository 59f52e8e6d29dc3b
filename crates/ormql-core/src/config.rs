//! Engine configuration.

use serde::Deserialize;

use crate::dialect::Dialect;
use crate::error::Result;

/// Configuration for the per-materialization identity cache.
///
/// The growth thresholds are tuning knobs, not a contract: a pass that stays
/// under `initial_capacity` distinct entities never evicts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IdentityCacheConfig {
    /// Capacity of a fresh cache.
    pub initial_capacity: usize,

    /// Hard ceiling for adaptive growth.
    pub max_capacity: usize,

    /// Accesses observed before growth is considered.
    pub min_accesses_before_growth: u64,

    /// Evictions / accesses above which capacity doubles.
    pub growth_eviction_ratio: f64,
}

impl Default for IdentityCacheConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 10_000,
            max_capacity: 1_000_000,
            min_accesses_before_growth: 1_000,
            growth_eviction_ratio: 0.3,
        }
    }
}

impl IdentityCacheConfig {
    /// Create a fixed-size cache configuration that never grows.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            initial_capacity: capacity,
            max_capacity: capacity,
            ..Default::default()
        }
    }

    /// Set the initial capacity.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the growth ceiling.
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Set how many accesses must be observed before growing.
    pub fn min_accesses_before_growth(mut self, accesses: u64) -> Self {
        self.min_accesses_before_growth = accesses;
        self
    }

    /// Set the eviction ratio that triggers growth.
    pub fn growth_eviction_ratio(mut self, ratio: f64) -> Self {
        self.growth_eviction_ratio = ratio;
        self
    }
}

/// Configuration for the query engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// Target SQL dialect.
    pub dialect: Dialect,

    /// Case-insensitive string comparisons. None means the dialect default.
    pub ignore_case: Option<bool>,

    /// Maximum entries in the evaluator cache before it is cleared.
    pub evaluator_cache_capacity: usize,

    /// Maximum cached include plans.
    pub plan_cache_capacity: usize,

    /// Identity cache sizing.
    pub identity_cache: IdentityCacheConfig,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            ignore_case: None,
            evaluator_cache_capacity: 1024,
            plan_cache_capacity: 256,
            identity_cache: IdentityCacheConfig::default(),
        }
    }
}

impl OrmConfig {
    /// Create a configuration for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Force case-insensitive (or sensitive) string comparisons.
    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = Some(ignore_case);
        self
    }

    /// Set the evaluator cache capacity.
    pub fn with_evaluator_cache_capacity(mut self, capacity: usize) -> Self {
        self.evaluator_cache_capacity = capacity;
        self
    }

    /// Set the plan cache capacity.
    pub fn with_plan_cache_capacity(mut self, capacity: usize) -> Self {
        self.plan_cache_capacity = capacity;
        self
    }

    /// Set the identity cache configuration.
    pub fn with_identity_cache(mut self, identity_cache: IdentityCacheConfig) -> Self {
        self.identity_cache = identity_cache;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrmConfig::default();
        assert_eq!(config.dialect, Dialect::SqlServer);
        assert_eq!(config.ignore_case, None);
        assert_eq!(config.evaluator_cache_capacity, 1024);
        assert_eq!(config.plan_cache_capacity, 256);
        assert_eq!(config.identity_cache.initial_capacity, 10_000);
        assert_eq!(config.identity_cache.max_capacity, 1_000_000);
        assert_eq!(config.identity_cache.min_accesses_before_growth, 1_000);
    }

    #[test]
    fn test_from_json_partial() {
        let config = OrmConfig::from_json_str(
            r#"{
                "dialect": "postgres",
                "ignore_case": true,
                "identity_cache": {"initial_capacity": 16}
            }"#,
        )
        .unwrap();

        assert_eq!(config.dialect, Dialect::Postgres);
        assert_eq!(config.ignore_case, Some(true));
        assert_eq!(config.identity_cache.initial_capacity, 16);
        assert_eq!(config.identity_cache.max_capacity, 1_000_000);
        assert_eq!(config.plan_cache_capacity, 256);
    }

    #[test]
    fn test_from_json_rejects_unknown_dialect() {
        let err = OrmConfig::from_json_str(r#"{"dialect": "db2"}"#).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_builders() {
        let config = OrmConfig::new(Dialect::Oracle)
            .with_ignore_case(true)
            .with_plan_cache_capacity(8)
            .with_identity_cache(IdentityCacheConfig::fixed(4));

        assert_eq!(config.dialect, Dialect::Oracle);
        assert_eq!(config.plan_cache_capacity, 8);
        assert_eq!(config.identity_cache.max_capacity, 4);
    }
}
