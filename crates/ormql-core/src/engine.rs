//! Query engine tying mapping, compilation, planning and materialization
//! together.

use std::sync::Arc;

use ormql_proto::{EntityQuery, Predicate, Value};
use tracing::{debug, instrument};

use crate::config::OrmConfig;
use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::include::{IncludePlanner, IncludeTree, PlanCache, SingleQueryPlan};
use crate::mapping::MappingResolver;
use crate::materialize::{EntityRef, GraphMaterializer, IdentityCache};
use crate::predicate::{
    EvaluatorCache, ParameterBag, PredicateCompiler, WhereClause, TRUE_CONDITION,
};

/// A compiled statement ready for execution.
#[derive(Debug, Clone)]
pub struct SqlStatement {
    /// Full SQL text including the WHERE clause, if any.
    pub sql: String,
    pub parameters: ParameterBag,
    /// The include plan the result rows must follow.
    pub plan: Arc<SingleQueryPlan>,
}

/// Compiles [`EntityQuery`] values to SQL and rebuilds object graphs from
/// the rows they return.
///
/// The evaluator cache may be shared between engines; plans are cached per
/// engine. Identity caches are never shared: each [`QueryEngine::materialize`]
/// call gets its own.
pub struct QueryEngine {
    config: OrmConfig,
    resolver: Arc<dyn MappingResolver>,
    evaluators: Arc<EvaluatorCache>,
    plans: PlanCache,
}

impl QueryEngine {
    pub fn new(config: OrmConfig, resolver: Arc<dyn MappingResolver>) -> Self {
        let evaluators = Arc::new(EvaluatorCache::new(config.evaluator_cache_capacity));
        let plans = PlanCache::new(config.plan_cache_capacity);
        Self {
            config,
            resolver,
            evaluators,
            plans,
        }
    }

    /// Use a shared evaluator cache.
    pub fn with_evaluator_cache(mut self, cache: Arc<EvaluatorCache>) -> Self {
        self.evaluators = cache;
        self
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.config.dialect.dialect()
    }

    pub fn evaluator_cache(&self) -> &Arc<EvaluatorCache> {
        &self.evaluators
    }

    pub fn plan_cache(&self) -> &PlanCache {
        &self.plans
    }

    /// Plan the includes of a query, reusing a cached plan of the same shape.
    pub fn plan(&self, query: &EntityQuery) -> Result<Arc<SingleQueryPlan>> {
        let root = self.resolver.require(&query.root_entity)?;
        let tree = IncludeTree::resolve(
            &query.root_entity,
            &query.includes,
            self.resolver.as_ref(),
        )?;
        let dialect = self.dialect();

        self.plans.get_or_try_insert(dialect.name(), &tree, || {
            IncludePlanner::new(dialect, self.resolver.as_ref()).plan(&root, &tree)
        })
    }

    /// Compile a predicate against a mapped entity type.
    pub fn compile_predicate(&self, entity: &str, predicate: &Predicate) -> Result<WhereClause> {
        let mapping = self.resolver.require(entity)?;
        PredicateCompiler::new(self.dialect(), &self.evaluators)
            .with_ignore_case(self.config.ignore_case)
            .compile(predicate, &mapping)
    }

    /// Compile a query into one SQL statement.
    #[instrument(skip(self, query), fields(entity = %query.root_entity))]
    pub fn compile(&self, query: &EntityQuery) -> Result<SqlStatement> {
        let plan = self.plan(query)?;

        let (sql, parameters) = match &query.filter {
            Some(filter) => {
                let clause = self.compile_predicate(&query.root_entity, filter)?;
                if clause.sql == TRUE_CONDITION {
                    (plan.sql.clone(), clause.parameters)
                } else {
                    (format!("{} WHERE {}", plan.sql, clause.sql), clause.parameters)
                }
            }
            None => (plan.sql.clone(), ParameterBag::new()),
        };

        debug!(parameters = parameters.len(), "compiled query");
        Ok(SqlStatement {
            sql,
            parameters,
            plan,
        })
    }

    /// Rebuild root entities from the rows returned for `statement`.
    #[instrument(skip_all, fields(entity = %statement.plan.root().mapping.entity_type()))]
    pub fn materialize<I>(
        &self,
        statement: &SqlStatement,
        columns: &[String],
        rows: I,
    ) -> Result<Vec<EntityRef>>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let mut identities = IdentityCache::new(self.config.identity_cache.clone());
        let roots =
            GraphMaterializer::new(&statement.plan, columns)?.materialize(rows, &mut identities)?;

        let stats = identities.stats();
        debug!(
            roots = roots.len(),
            identities = stats.len,
            evictions = stats.evictions,
            growths = stats.growths,
            "identity cache released"
        );
        Ok(roots)
    }
}
