//! Predicate-to-SQL compilation.
//!
//! Walks a predicate tree against one entity mapping and emits a
//! parameterized WHERE clause. Entity property reads become aliased, quoted
//! columns; everything that does not touch the entity is evaluated on the
//! client (through the [`EvaluatorCache`]) and bound as a parameter or folded
//! into a constant condition.

use ormql_proto::{BinaryOp, Expr, Method, Predicate, Value};
use tracing::{debug, instrument};

use super::eval::EvaluatorCache;
use super::params::ParameterBag;
use crate::dialect::SqlDialect;
use crate::error::{Error, Result};
use crate::mapping::EntityMapping;
use crate::ROOT_ALIAS;

/// Always-true condition.
pub const TRUE_CONDITION: &str = "1=1";
/// Always-false condition.
pub const FALSE_CONDITION: &str = "1=0";

/// A compiled WHERE clause (without the `WHERE` keyword).
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub parameters: ParameterBag,
}

/// Compiles predicates for one dialect.
///
/// ```ignore
/// let cache = EvaluatorCache::default();
/// let compiler = PredicateCompiler::new(&Dialect::SqlServer, &cache).with_ignore_case(Some(true));
/// let clause = compiler.compile(&predicate, &person_mapping)?;
/// ```
#[derive(Debug, Clone)]
pub struct PredicateCompiler<'a> {
    dialect: &'a dyn SqlDialect,
    cache: &'a EvaluatorCache,
    ignore_case: bool,
    alias: String,
}

impl<'a> PredicateCompiler<'a> {
    /// Create a compiler using the dialect's default case sensitivity.
    pub fn new(dialect: &'a dyn SqlDialect, cache: &'a EvaluatorCache) -> Self {
        Self {
            dialect,
            cache,
            ignore_case: dialect.default_ignore_case(),
            alias: ROOT_ALIAS.to_string(),
        }
    }

    /// Override case sensitivity; `None` keeps the current setting.
    pub fn with_ignore_case(mut self, ignore_case: Option<bool>) -> Self {
        if let Some(ignore_case) = ignore_case {
            self.ignore_case = ignore_case;
        }
        self
    }

    /// Qualify columns with a different table alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    /// Compile a predicate into a WHERE clause.
    #[instrument(skip(self, predicate, mapping), fields(entity = %mapping.entity_type()))]
    pub fn compile(&self, predicate: &Predicate, mapping: &EntityMapping) -> Result<WhereClause> {
        let mut visitor = Visitor {
            compiler: self,
            mapping,
            params: ParameterBag::new(),
        };
        let sql = visitor.condition(&predicate.body)?;

        debug!(parameters = visitor.params.len(), "compiled predicate");
        Ok(WhereClause {
            sql,
            parameters: visitor.params,
        })
    }
}

/// Compile a predicate in one call.
pub fn compile(
    predicate: &Predicate,
    mapping: &EntityMapping,
    dialect: &dyn SqlDialect,
    ignore_case: Option<bool>,
    cache: &EvaluatorCache,
) -> Result<WhereClause> {
    PredicateCompiler::new(dialect, cache)
        .with_ignore_case(ignore_case)
        .compile(predicate, mapping)
}

struct Visitor<'c, 'a> {
    compiler: &'c PredicateCompiler<'a>,
    mapping: &'c EntityMapping,
    params: ParameterBag,
}

impl Visitor<'_, '_> {
    fn entity(&self) -> &str {
        self.mapping.entity_type()
    }

    fn not_supported(&self, message: impl Into<String>) -> Error {
        Error::not_supported(self.entity(), message)
    }

    fn evaluation(&self, message: impl Into<String>) -> Error {
        Error::evaluation(self.entity(), message)
    }

    fn column(&self, property: &str) -> Result<String> {
        let column = self.mapping.require_column(property)?;
        Ok(format!(
            "{}.{}",
            self.compiler.alias,
            self.compiler.dialect.quote_identifier(column)
        ))
    }

    fn bind(&mut self, value: Value) -> String {
        let dialect = self.compiler.dialect;
        self.params.bind(dialect, value)
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            _ => self.compiler.cache.evaluate(expr, self.entity()),
        }
    }

    fn is_null_like(&self, value: &Value) -> bool {
        value.is_null_like(self.compiler.dialect.empty_string_is_null())
    }

    fn bool_condition(&self, column: String, expected: bool) -> String {
        format!("{} = {}", column, self.compiler.dialect.format_bool(expected))
    }

    fn fold_case(&self, s: &str) -> String {
        if self.compiler.dialect.case_fold_function() == "UPPER" {
            s.to_uppercase()
        } else {
            s.to_lowercase()
        }
    }

    /// Compile an expression in boolean position.
    fn condition(&mut self, expr: &Expr) -> Result<String> {
        if !expr.depends_on_parameter() {
            return self.constant_condition(expr);
        }
        if let Some(property) = expr.as_property() {
            let column = self.column(property)?;
            return Ok(self.bool_condition(column, true));
        }

        match expr {
            Expr::Binary { op, left, right } if op.is_logical() => {
                let left = self.condition(left)?;
                let right = self.condition(right)?;
                Ok(format!("({}) {} ({})", left, op.sql(), right))
            }
            Expr::Binary { op, left, right } if op.is_comparison() => {
                self.comparison(*op, left, right)
            }
            Expr::Not(operand) => match operand.as_property() {
                Some(property) => {
                    let column = self.column(property)?;
                    Ok(self.bool_condition(column, false))
                }
                None => Ok(format!("NOT ({})", self.condition(operand)?)),
            },
            Expr::Call {
                method,
                target,
                args,
            } => self.method_condition(method, target.as_deref(), args),
            Expr::Member { target, member } => Err(self.member_error(target, member)),
            other => Err(self.not_supported(format!(
                "{} cannot be used as a condition",
                describe(other)
            ))),
        }
    }

    fn constant_condition(&self, expr: &Expr) -> Result<String> {
        match self.evaluate(expr)? {
            Value::Bool(true) => Ok(TRUE_CONDITION.to_string()),
            Value::Bool(false) | Value::Null => Ok(FALSE_CONDITION.to_string()),
            other => Err(self.evaluation(format!(
                "condition evaluated to a {:?} value",
                other.kind()
            ))),
        }
    }

    fn comparison(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<String> {
        match (left.depends_on_parameter(), right.depends_on_parameter()) {
            (true, false) => self.compare_with_value(op, left, right, false),
            (false, true) => self.compare_with_value(op, right, left, true),
            _ => {
                let left = self.scalar(left)?;
                let right = self.scalar(right)?;
                Ok(format!("{} {} {}", left, op.sql(), right))
            }
        }
    }

    /// Comparison between an entity expression and a client-side value.
    fn compare_with_value(
        &mut self,
        op: BinaryOp,
        entity_expr: &Expr,
        value_expr: &Expr,
        value_on_left: bool,
    ) -> Result<String> {
        let value = self.evaluate(value_expr)?;

        if self.is_null_like(&value) {
            let operand = self.scalar(entity_expr)?;
            return Ok(match op {
                BinaryOp::Eq => format!("{} IS NULL", operand),
                BinaryOp::Ne => format!("{} IS NOT NULL", operand),
                _ => FALSE_CONDITION.to_string(),
            });
        }

        if let (Value::Bool(b), BinaryOp::Eq | BinaryOp::Ne) = (&value, op) {
            let expected = *b == (op == BinaryOp::Eq);
            if let Some(property) = entity_expr.as_property() {
                let column = self.column(property)?;
                return Ok(self.bool_condition(column, expected));
            }
            if is_condition_shaped(entity_expr) {
                let condition = self.condition(entity_expr)?;
                return Ok(if expected {
                    condition
                } else {
                    format!("NOT ({})", condition)
                });
            }
        }

        if value.is_list() {
            return Err(self.evaluation(format!(
                "a list cannot be compared with '{}'",
                op.sql()
            )));
        }

        let fold = self.compiler.ignore_case
            && matches!(op, BinaryOp::Eq | BinaryOp::Ne)
            && matches!(value, Value::String(_));
        let value = match value {
            Value::String(s) if fold => Value::String(self.fold_case(&s)),
            value => value,
        };

        // Bind in textual order so positional placeholders line up
        let (operand, placeholder) = if value_on_left {
            let placeholder = self.bind(value);
            (self.scalar(entity_expr)?, placeholder)
        } else {
            let operand = self.scalar(entity_expr)?;
            (operand, self.bind(value))
        };
        let (operand, placeholder) = if fold {
            let function = self.compiler.dialect.case_fold_function();
            (
                format!("{}({})", function, operand),
                format!("{}({})", function, placeholder),
            )
        } else {
            (operand, placeholder)
        };

        Ok(if value_on_left {
            format!("{} {} {}", placeholder, op.sql(), operand)
        } else {
            format!("{} {} {}", operand, op.sql(), placeholder)
        })
    }

    /// Compile an expression in value position.
    fn scalar(&mut self, expr: &Expr) -> Result<String> {
        if !expr.depends_on_parameter() {
            return match self.evaluate(expr)? {
                Value::Null => Ok("NULL".to_string()),
                Value::List(_) => Err(self.evaluation("a list cannot be used as a single value")),
                value => Ok(self.bind(value)),
            };
        }
        if let Some(property) = expr.as_property() {
            return self.column(property);
        }

        match expr {
            Expr::Parameter(name) => Err(self.not_supported(format!(
                "parameter '{}' cannot be used as a value",
                name
            ))),
            Expr::Member { target, member } => Err(self.member_error(target, member)),
            Expr::Convert { operand, .. } => self.scalar(operand),
            Expr::Negate(operand) => Ok(format!("-({})", self.scalar(operand)?)),
            Expr::Binary { op, left, right } if op.is_arithmetic() => {
                let left = self.scalar(left)?;
                let right = self.scalar(right)?;
                Ok(format!("({} {} {})", left, op.sql(), right))
            }
            Expr::Binary {
                op: BinaryOp::Coalesce,
                left,
                right,
            } => {
                let left = self.scalar(left)?;
                let right = self.scalar(right)?;
                Ok(format!("COALESCE({}, {})", left, right))
            }
            Expr::Call {
                method: method @ (Method::ToLower | Method::ToUpper | Method::Trim),
                target: Some(target),
                args,
            } if args.is_empty() => {
                let function = match method {
                    Method::ToLower => "LOWER",
                    Method::ToUpper => "UPPER",
                    _ => "TRIM",
                };
                Ok(format!("{}({})", function, self.scalar(target)?))
            }
            Expr::Call {
                method: Method::Named(name),
                ..
            } => Err(self.not_supported(format!("method '{}' is not supported", name))),
            other => Err(self.not_supported(format!(
                "{} cannot be used as a value",
                describe(other)
            ))),
        }
    }

    fn method_condition(
        &mut self,
        method: &Method,
        target: Option<&Expr>,
        args: &[Expr],
    ) -> Result<String> {
        match (method, target, args) {
            (Method::Contains, None, [first, second]) => {
                let swapped = first.depends_on_parameter()
                    && !second.depends_on_parameter()
                    && !matches!(first, Expr::List(_));
                if swapped {
                    self.membership(second, first)
                } else {
                    self.membership(first, second)
                }
            }
            (
                Method::Contains | Method::StartsWith | Method::EndsWith,
                Some(target),
                [arg],
            ) => {
                if target.depends_on_parameter() {
                    if arg.depends_on_parameter() {
                        return Err(self.not_supported(format!(
                            "'{}' with an entity-dependent argument is not supported",
                            method.name()
                        )));
                    }
                    self.like(method, target, arg)
                } else if *method == Method::Contains {
                    self.membership(target, arg)
                } else {
                    Err(self.not_supported(format!(
                        "'{}' on a captured value with an entity argument is not supported",
                        method.name()
                    )))
                }
            }
            (Method::Named(name), _, _) => {
                Err(self.not_supported(format!("method '{}' is not supported", name)))
            }
            _ => Err(self.not_supported(format!(
                "method '{}' cannot be used as a condition",
                method.name()
            ))),
        }
    }

    /// `col LIKE pattern ESCAPE '\'` for Contains/StartsWith/EndsWith.
    fn like(&mut self, method: &Method, target: &Expr, arg: &Expr) -> Result<String> {
        let pattern = match self.evaluate(arg)? {
            Value::String(s) => s,
            Value::Null => {
                return Err(self.evaluation(format!(
                    "pattern for '{}' is null",
                    method.name()
                )))
            }
            other => {
                return Err(self.evaluation(format!(
                    "pattern for '{}' must be a string, got {:?}",
                    method.name(),
                    other.kind()
                )))
            }
        };

        let escaped = escape_like(&pattern);
        let pattern = match method {
            Method::StartsWith => format!("{}%", escaped),
            Method::EndsWith => format!("%{}", escaped),
            _ => format!("%{}%", escaped),
        };

        let operand = self.scalar(target)?;
        let escape = self.compiler.dialect.like_escape_clause();

        if self.compiler.ignore_case {
            let function = self.compiler.dialect.case_fold_function();
            let folded = self.fold_case(&pattern);
            let placeholder = self.bind(Value::String(folded));
            Ok(format!(
                "{f}({}) LIKE {f}({}) {}",
                operand,
                placeholder,
                escape,
                f = function
            ))
        } else {
            let placeholder = self.bind(Value::String(pattern));
            Ok(format!("{} LIKE {} {}", operand, placeholder, escape))
        }
    }

    /// `col IN (...)` for collection membership.
    fn membership(&mut self, collection: &Expr, item: &Expr) -> Result<String> {
        if collection.depends_on_parameter() {
            return Err(self.not_supported(
                "membership in an entity-dependent collection is not supported",
            ));
        }

        let values = match self.evaluate(collection)? {
            Value::List(items) => items,
            Value::Null => return Err(self.evaluation("collection for 'Contains' is null")),
            other => {
                return Err(self.evaluation(format!(
                    "collection for 'Contains' must be a list, got {:?}",
                    other.kind()
                )))
            }
        };

        if values.is_empty() {
            return Ok(FALSE_CONDITION.to_string());
        }

        let operand = self.scalar(item)?;
        let empty_string_is_null = self.compiler.dialect.empty_string_is_null();
        let (nulls, present): (Vec<Value>, Vec<Value>) = values
            .into_iter()
            .partition(|v| v.is_null_like(empty_string_is_null));

        if present.is_empty() {
            return Ok(format!("{} IS NULL", operand));
        }

        let placeholders = present
            .into_iter()
            .map(|value| self.bind(value))
            .collect::<Vec<_>>()
            .join(", ");

        if nulls.is_empty() {
            Ok(format!("{} IN ({})", operand, placeholders))
        } else {
            // Rendered again so positional placeholders bind once per occurrence
            let repeated = self.scalar(item)?;
            Ok(format!(
                "({} IN ({}) OR {} IS NULL)",
                operand, placeholders, repeated
            ))
        }
    }

    fn member_error(&self, target: &Expr, member: &str) -> Error {
        match member_path(target) {
            Some(path) if !path.is_empty() => self.not_supported(format!(
                "navigation access '{}.{}' is not supported in filters",
                path, member
            )),
            _ => self.not_supported(format!("member access '{}' is not supported", member)),
        }
    }
}

/// Escape `\`, `%` and `_` for a LIKE pattern using `\` as the escape character.
pub fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_condition_shaped(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { op, .. } => op.is_comparison() || op.is_logical(),
        Expr::Not(_) => true,
        Expr::Call { method, .. } => matches!(
            method,
            Method::Contains | Method::StartsWith | Method::EndsWith
        ),
        _ => false,
    }
}

/// Dotted member path below the entity parameter, e.g. `Customer` for
/// `x.Customer`. `None` when the chain does not start at the parameter.
fn member_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Parameter(_) => Some(String::new()),
        Expr::Convert { operand, .. } => member_path(operand),
        Expr::Member { target, member } => member_path(target).map(|path| {
            if path.is_empty() {
                member.clone()
            } else {
                format!("{}.{}", path, member)
            }
        }),
        _ => None,
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Parameter(name) => format!("parameter '{}'", name),
        Expr::Member { member, .. } => format!("member '{}'", member),
        Expr::Constant(_) | Expr::Closure(_) => "a captured value".to_string(),
        Expr::Binary { op, .. } => format!("'{}' expression", op.sql()),
        Expr::Not(_) => "negation".to_string(),
        Expr::Negate(_) => "arithmetic negation".to_string(),
        Expr::Convert { to, .. } => format!("conversion to {:?}", to),
        Expr::Call { method, .. } => format!("method '{}'", method.name()),
        Expr::List(_) => "a list literal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::mapping::{ForeignKey, PropertyMapping};
    use ormql_proto::{constant, contains, list, list_of, prop, Closure};
    use pretty_assertions::assert_eq;

    fn person() -> EntityMapping {
        EntityMapping::builder("Person", "People")
            .key("Id")
            .column("Id")
            .column("Name")
            .column("Age")
            .column("Active")
            .property(PropertyMapping::new("Email").with_column("email_address"))
            .column("CustomerId")
            .foreign_key(ForeignKey::new("Customer", "CustomerId", "Customer", "Id"))
            .build()
            .unwrap()
    }

    fn compile_with(
        dialect: Dialect,
        ignore_case: Option<bool>,
        body: Expr,
    ) -> Result<WhereClause> {
        let cache = EvaluatorCache::new(64);
        compile(&Predicate::new("x", body), &person(), &dialect, ignore_case, &cache)
    }

    fn sql(body: Expr) -> String {
        compile_with(Dialect::SqlServer, None, body).unwrap().sql
    }

    #[test]
    fn test_starts_with_and_comparison_ignoring_case() {
        let body = prop("x", "Name")
            .starts_with("Jo")
            .and(prop("x", "Age").gt(18));

        let clause = compile_with(Dialect::SqlServer, Some(true), body).unwrap();

        assert_eq!(
            clause.sql,
            r"(LOWER(a.[Name]) LIKE LOWER(@p0) ESCAPE '\') AND (a.[Age] > @p1)"
        );
        assert_eq!(clause.parameters.get("p0"), Some(&Value::from("jo%")));
        assert_eq!(clause.parameters.get("p1"), Some(&Value::Int32(18)));
    }

    #[test]
    fn test_bool_shorthand_matches_explicit_comparison() {
        let bare = sql(prop("x", "Active"));
        let explicit = sql(prop("x", "Active").equals(true));

        assert_eq!(bare, "a.[Active] = 1");
        assert_eq!(bare, explicit);
        assert_eq!(
            compile_with(Dialect::Postgres, None, prop("x", "Active"))
                .unwrap()
                .sql,
            "a.\"Active\" = true"
        );
    }

    #[test]
    fn test_negated_bool_shorthand() {
        assert_eq!(sql(!prop("x", "Active")), "a.[Active] = 0");
        assert_eq!(sql(prop("x", "Active").equals(false)), "a.[Active] = 0");
        assert_eq!(sql(prop("x", "Active").not_equals(true)), "a.[Active] = 0");
        assert_eq!(sql(prop("x", "Active").not_equals(false)), "a.[Active] = 1");

        let clause =
            compile_with(Dialect::SqlServer, None, prop("x", "Active").equals(true)).unwrap();
        assert!(clause.parameters.is_empty());
    }

    #[test]
    fn test_null_comparisons_never_bind_parameters() {
        let scope = Closure::new("Scope").with_field("none", Value::Null).share();
        let cases = vec![
            (prop("x", "Name").equals(Value::Null), "a.[Name] IS NULL"),
            (prop("x", "Name").not_equals(Value::Null), "a.[Name] IS NOT NULL"),
            (constant(Value::Null).equals(prop("x", "Age")), "a.[Age] IS NULL"),
            (prop("x", "Email").equals(scope.read("none")), "a.[email_address] IS NULL"),
            (
                prop("x", "Name").to_lower().not_equals(scope.read("none")),
                "LOWER(a.[Name]) IS NOT NULL",
            ),
        ];

        for (body, expected) in cases {
            let clause = compile_with(Dialect::SqlServer, Some(true), body).unwrap();
            assert_eq!(clause.sql, expected);
            assert!(clause.parameters.is_empty());
        }
    }

    #[test]
    fn test_ordering_against_null_is_false() {
        assert_eq!(sql(prop("x", "Age").gt(Value::Null)), "1=0");
    }

    #[test]
    fn test_empty_string_is_null_only_where_the_dialect_says_so() {
        let oracle = compile_with(Dialect::Oracle, None, prop("x", "Name").equals("")).unwrap();
        assert_eq!(oracle.sql, "a.\"Name\" IS NULL");
        assert!(oracle.parameters.is_empty());

        let sqlserver =
            compile_with(Dialect::SqlServer, None, prop("x", "Name").equals("")).unwrap();
        assert_eq!(sqlserver.sql, "a.[Name] = @p0");
        assert_eq!(sqlserver.parameters.len(), 1);
    }

    #[test]
    fn test_string_equality_case_folding() {
        let sensitive = compile_with(
            Dialect::SqlServer,
            Some(false),
            prop("x", "Name").equals("Jo"),
        )
        .unwrap();
        assert_eq!(sensitive.sql, "a.[Name] = @p0");
        assert_eq!(sensitive.parameters.get("p0"), Some(&Value::from("Jo")));

        let folded = compile_with(
            Dialect::SqlServer,
            Some(true),
            prop("x", "Name").equals("Jo"),
        )
        .unwrap();
        assert_eq!(folded.sql, "LOWER(a.[Name]) = LOWER(@p0)");
        assert_eq!(folded.parameters.get("p0"), Some(&Value::from("jo")));
    }

    #[test]
    fn test_like_escapes_wildcards() {
        let clause = compile_with(
            Dialect::SqlServer,
            None,
            prop("x", "Name").contains(r"50%_off\"),
        )
        .unwrap();

        assert_eq!(clause.sql, r"a.[Name] LIKE @p0 ESCAPE '\'");
        assert_eq!(
            clause.parameters.get("p0"),
            Some(&Value::from(r"%50\%\_off\\%"))
        );

        let ends = compile_with(Dialect::MySql, None, prop("x", "Name").ends_with("son")).unwrap();
        assert_eq!(ends.sql, r"a.`Name` LIKE ? ESCAPE '\\'");
        assert_eq!(ends.parameters.get("p0"), Some(&Value::from("%son")));
    }

    #[test]
    fn test_null_pattern_is_an_evaluation_error() {
        let err = compile_with(
            Dialect::SqlServer,
            None,
            prop("x", "Name").starts_with(Value::Null),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }));
        assert!(err.to_string().contains("StartsWith"));
    }

    #[test]
    fn test_membership() {
        let ids = Closure::new("Scope").with_field("ids", list([1, 2, 3])).share();
        let clause = compile_with(
            Dialect::SqlServer,
            None,
            ids.read("ids").contains(prop("x", "Id")),
        )
        .unwrap();
        assert_eq!(clause.sql, "a.[Id] IN (@p0, @p1, @p2)");
        assert_eq!(clause.parameters.len(), 3);

        // Static form, either argument order
        assert_eq!(
            sql(contains(list_of([4, 5]), prop("x", "Id"))),
            "a.[Id] IN (@p0, @p1)"
        );
        assert_eq!(
            sql(contains(prop("x", "Id"), list_of([4, 5]))),
            "a.[Id] IN (@p0, @p1)"
        );
    }

    #[test]
    fn test_membership_in_empty_collection_is_false() {
        let empty = Closure::new("Scope")
            .with_field("ids", Value::List(vec![]))
            .share();
        let clause = compile_with(
            Dialect::SqlServer,
            None,
            contains(empty.read("ids"), prop("x", "Id")),
        )
        .unwrap();

        assert_eq!(clause.sql, "1=0");
        assert!(clause.parameters.is_empty());
    }

    #[test]
    fn test_membership_with_nulls() {
        let values = Value::List(vec![Value::from("a"), Value::Null]);
        assert_eq!(
            sql(contains(constant(values), prop("x", "Name"))),
            "(a.[Name] IN (@p0) OR a.[Name] IS NULL)"
        );
        assert_eq!(
            sql(contains(constant(Value::List(vec![Value::Null])), prop("x", "Name"))),
            "a.[Name] IS NULL"
        );
    }

    #[test]
    fn test_membership_with_nulls_binds_repeated_operand_positionally() {
        let body = contains(
            list_of([Value::Int32(2), Value::Null]),
            prop("x", "Age") + 1,
        );
        let clause = compile_with(Dialect::MySql, None, body).unwrap();

        assert_eq!(
            clause.sql,
            "((a.`Age` + ?) IN (?) OR (a.`Age` + ?) IS NULL)"
        );
        assert_eq!(
            clause.parameters.values(),
            vec![Value::Int32(1), Value::Int32(2), Value::Int32(1)]
        );
    }

    #[test]
    fn test_membership_in_entity_dependent_list_is_not_supported() {
        let err = compile_with(
            Dialect::SqlServer,
            None,
            contains(list_of([prop("x", "Id")]), 5),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));
    }

    #[test]
    fn test_null_membership_source_is_an_evaluation_error() {
        let scope = Closure::new("Scope").with_field("ids", Value::Null).share();
        let err = compile_with(
            Dialect::SqlServer,
            None,
            contains(scope.read("ids"), prop("x", "Id")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }));
    }

    #[test]
    fn test_same_shape_compiles_to_same_sql() {
        let young = Closure::new("Filter")
            .with_field("age", 18)
            .with_field("name", "Jo")
            .share();
        let old = Closure::new("Filter")
            .with_field("age", 65)
            .with_field("name", "Al")
            .share();

        let build = |scope: &std::sync::Arc<Closure>| {
            Predicate::new(
                "x",
                prop("x", "Age")
                    .gte(scope.read("age"))
                    .or(prop("x", "Name").equals(scope.read("name"))),
            )
        };

        let cache = EvaluatorCache::new(64);
        let compiler = PredicateCompiler::new(&Dialect::SqlServer, &cache);
        let first = compiler.compile(&build(&young), &person()).unwrap();
        let second = compiler.compile(&build(&old), &person()).unwrap();

        assert_eq!(first.sql, second.sql);
        assert_eq!(first.parameters.len(), second.parameters.len());
        assert_eq!(second.parameters.values(), vec![Value::Int32(65), Value::from("Al")]);
        // One evaluator per captured-field shape, reused on the second compile
        assert_eq!(cache.stats().misses(), 2);
        assert_eq!(cache.stats().hits(), 2);
    }

    #[test]
    fn test_unmapped_property_names_the_property() {
        let err = compile_with(Dialect::SqlServer, None, prop("x", "Nickname").equals("a"))
            .unwrap_err();
        assert!(matches!(err, Error::Mapping { .. }));
        assert!(err.to_string().contains("Nickname"));
    }

    #[test]
    fn test_unsupported_method_names_the_method() {
        let err = compile_with(
            Dialect::SqlServer,
            None,
            prop("x", "Name").call("Normalize", vec![]).equals("a"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));
        assert!(err.to_string().contains("Normalize"));

        let err = compile_with(
            Dialect::SqlServer,
            None,
            prop("x", "Name").call("IsMatch", vec![constant("a+")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("IsMatch"));
    }

    #[test]
    fn test_navigation_access_is_not_supported() {
        let err = compile_with(
            Dialect::SqlServer,
            None,
            prop("x", "Customer").member("Name").equals("a"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));
        assert!(err.to_string().contains("Customer.Name"));
    }

    #[test]
    fn test_entity_independent_condition_folds() {
        let scope = Closure::new("Scope").with_field("enabled", true).share();
        assert_eq!(sql(scope.read("enabled")), "1=1");
        assert_eq!(
            sql(scope.read("enabled").and(prop("x", "Age").lt(5))),
            "(1=1) AND (a.[Age] < @p0)"
        );
        assert_eq!(sql(constant(1).equals(2)), "1=0");
    }

    #[test]
    fn test_arithmetic_and_value_on_left() {
        let scope = Closure::new("Scope").with_field("min", 18).share();
        let clause = compile_with(
            Dialect::SqlServer,
            None,
            (prop("x", "Age") + 1).gt(scope.read("min") * 2),
        )
        .unwrap();
        assert_eq!(clause.sql, "(a.[Age] + @p0) > @p1");
        assert_eq!(clause.parameters.values(), vec![Value::Int32(1), Value::Int32(36)]);

        assert_eq!(sql(constant(18).lt(prop("x", "Age"))), "@p0 < a.[Age]");

        let clause =
            compile_with(Dialect::MySql, None, constant(18).lt(prop("x", "Age") + 1)).unwrap();
        assert_eq!(clause.sql, "? < (a.`Age` + ?)");
        assert_eq!(clause.parameters.values(), vec![Value::Int32(18), Value::Int32(1)]);
    }

    #[test]
    fn test_not_and_column_comparisons() {
        assert_eq!(sql(!prop("x", "Age").gt(18)), "NOT (a.[Age] > @p0)");
        assert_eq!(
            sql(prop("x", "Age").equals(prop("x", "CustomerId"))),
            "a.[Age] = a.[CustomerId]"
        );
        assert_eq!(
            sql(prop("x", "Name").trim().to_upper().equals("A")),
            "UPPER(TRIM(a.[Name])) = @p0"
        );
    }

    #[test]
    fn test_condition_compared_with_bool() {
        assert_eq!(
            sql(prop("x", "Age").gt(18).equals(false)),
            "NOT (a.[Age] > @p0)"
        );
    }

    #[test]
    fn test_convert_is_transparent() {
        use ormql_proto::ValueKind;
        assert_eq!(
            sql(prop("x", "Age").convert(ValueKind::Int64).gt(1i64)),
            "a.[Age] > @p0"
        );
    }

    #[test]
    fn test_dialect_placeholders() {
        let body = prop("x", "Age").gt(1).and(prop("x", "Age").lt(9));
        assert_eq!(
            compile_with(Dialect::Postgres, None, body.clone()).unwrap().sql,
            "(a.\"Age\" > $1) AND (a.\"Age\" < $2)"
        );
        assert_eq!(
            compile_with(Dialect::Oracle, None, body.clone()).unwrap().sql,
            "(a.\"Age\" > :p0) AND (a.\"Age\" < :p1)"
        );
        assert_eq!(
            compile_with(Dialect::MySql, None, body).unwrap().sql,
            "(a.`Age` > ?) AND (a.`Age` < ?)"
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like(r"a%b_c\d"), r"a\%b\_c\\d");
    }
}
