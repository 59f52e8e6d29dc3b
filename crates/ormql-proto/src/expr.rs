//! Predicate expression trees.
//!
//! A [`Predicate`] is a boolean lambda over one entity parameter. Its body is
//! a closed [`Expr`] tree: member reads on the parameter are entity property
//! references, member reads on a [`Closure`] are captured values, and
//! everything else is an operator, a method call or a literal.
//!
//! ```ignore
//! use ormql_proto::expr::{prop, Closure};
//!
//! let scope = Closure::new("AgeFilter").with_field("min", 18).share();
//! let predicate = Predicate::new(
//!     "x",
//!     prop("x", "Name").starts_with("Jo").and(prop("x", "Age").gt(scope.read("min"))),
//! );
//! ```

use std::ops::{Add, Div, Mul, Neg, Not, Rem, Sub};
use std::sync::Arc;

use crate::value::{Value, ValueKind};

/// A boolean predicate over a single entity parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Name of the bound entity parameter (e.g. `x` in `x => x.Age > 18`).
    pub parameter: String,
    /// The predicate body.
    pub body: Expr,
}

impl Predicate {
    /// Create a new predicate.
    pub fn new(parameter: impl Into<String>, body: Expr) -> Self {
        Self {
            parameter: parameter.into(),
            body,
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Short-circuit logical AND.
    And,
    /// Short-circuit logical OR.
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Left operand unless it is null, otherwise the right operand.
    Coalesce,
}

impl BinaryOp {
    /// Whether this is one of the six comparison operators.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Whether this is AND or OR.
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Whether this is an arithmetic operator.
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// SQL spelling of the operator.
    pub fn sql(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Coalesce => "COALESCE",
        }
    }
}

/// Methods that may appear in a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// `string.Contains(s)` or `collection.Contains(item)`.
    Contains,
    StartsWith,
    EndsWith,
    ToLower,
    ToUpper,
    Trim,
    /// Any other method. Never translatable to SQL.
    Named(String),
}

impl Method {
    /// The method name as written by the caller.
    pub fn name(&self) -> &str {
        match self {
            Method::Contains => "Contains",
            Method::StartsWith => "StartsWith",
            Method::EndsWith => "EndsWith",
            Method::ToLower => "ToLower",
            Method::ToUpper => "ToUpper",
            Method::Trim => "Trim",
            Method::Named(name) => name,
        }
    }
}

/// A captured environment object whose fields are read by the predicate.
///
/// Only `type_name` participates in structural hashing; two closures of the
/// same type are interchangeable for caching purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    /// Declared type of the captured object.
    pub type_name: String,
    /// Captured fields.
    pub fields: Vec<(String, Value)>,
}

impl Closure {
    /// Create an empty closure of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a captured field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Get a captured field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Finish building and share the closure.
    pub fn share(self) -> Arc<Closure> {
        Arc::new(self)
    }

    /// Expression reading one of this closure's fields.
    pub fn read(self: &Arc<Self>, member: impl Into<String>) -> Expr {
        Expr::Member {
            target: Box::new(Expr::Closure(Arc::clone(self))),
            member: member.into(),
        }
    }
}

/// A node in a predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The predicate's entity parameter.
    Parameter(String),
    /// Member read: an entity property when `target` is the parameter, a
    /// captured value when `target` is a closure.
    Member { target: Box<Expr>, member: String },
    /// Literal value.
    Constant(Value),
    /// Captured environment object.
    Closure(Arc<Closure>),
    /// Binary operator.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// Arithmetic negation.
    Negate(Box<Expr>),
    /// Type conversion (e.g. widening to a nullable type).
    Convert { to: ValueKind, operand: Box<Expr> },
    /// Method call; `target` is `None` for static calls.
    Call {
        method: Method,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    /// Inline collection literal.
    List(Vec<Expr>),
}

/// Reference to the entity parameter.
pub fn param(name: impl Into<String>) -> Expr {
    Expr::Parameter(name.into())
}

/// Entity property reference, `param.member`.
pub fn prop(param_name: impl Into<String>, member: impl Into<String>) -> Expr {
    param(param_name).member(member)
}

/// Literal value.
pub fn constant(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// Inline collection literal.
pub fn list_of<I, T>(items: I) -> Expr
where
    I: IntoIterator<Item = T>,
    T: Into<Expr>,
{
    Expr::List(items.into_iter().map(Into::into).collect())
}

/// Static collection membership, `Contains(collection, item)`.
pub fn contains(collection: impl Into<Expr>, item: impl Into<Expr>) -> Expr {
    Expr::Call {
        method: Method::Contains,
        target: None,
        args: vec![collection.into(), item.into()],
    }
}

impl Expr {
    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    fn method(self, method: Method, args: Vec<Expr>) -> Expr {
        Expr::Call {
            method,
            target: Some(Box::new(self)),
            args,
        }
    }

    /// Member read on this expression.
    pub fn member(self, member: impl Into<String>) -> Expr {
        Expr::Member {
            target: Box::new(self),
            member: member.into(),
        }
    }

    pub fn equals(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn not_equals(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ne, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn lte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Le, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn gte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ge, other)
    }

    pub fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Or, other)
    }

    pub fn coalesce(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Coalesce, other)
    }

    /// `self.Contains(arg)`: substring test on strings, membership on collections.
    pub fn contains(self, arg: impl Into<Expr>) -> Expr {
        self.method(Method::Contains, vec![arg.into()])
    }

    pub fn starts_with(self, arg: impl Into<Expr>) -> Expr {
        self.method(Method::StartsWith, vec![arg.into()])
    }

    pub fn ends_with(self, arg: impl Into<Expr>) -> Expr {
        self.method(Method::EndsWith, vec![arg.into()])
    }

    pub fn to_lower(self) -> Expr {
        self.method(Method::ToLower, vec![])
    }

    pub fn to_upper(self) -> Expr {
        self.method(Method::ToUpper, vec![])
    }

    pub fn trim(self) -> Expr {
        self.method(Method::Trim, vec![])
    }

    /// Call an arbitrary named method on this expression.
    pub fn call(self, name: impl Into<String>, args: Vec<Expr>) -> Expr {
        self.method(Method::Named(name.into()), args)
    }

    /// Convert to another value kind.
    pub fn convert(self, to: ValueKind) -> Expr {
        Expr::Convert {
            to,
            operand: Box::new(self),
        }
    }

    /// Whether any node below (or at) this one reads the entity parameter.
    pub fn depends_on_parameter(&self) -> bool {
        match self {
            Expr::Parameter(_) => true,
            Expr::Constant(_) | Expr::Closure(_) => false,
            Expr::Member { target, .. } => target.depends_on_parameter(),
            Expr::Binary { left, right, .. } => {
                left.depends_on_parameter() || right.depends_on_parameter()
            }
            Expr::Not(operand) | Expr::Negate(operand) | Expr::Convert { operand, .. } => {
                operand.depends_on_parameter()
            }
            Expr::Call { target, args, .. } => {
                target.as_deref().is_some_and(Expr::depends_on_parameter)
                    || args.iter().any(Expr::depends_on_parameter)
            }
            Expr::List(items) => items.iter().any(Expr::depends_on_parameter),
        }
    }

    /// The property name if this is a direct entity property reference,
    /// looking through conversions.
    pub fn as_property(&self) -> Option<&str> {
        match self {
            Expr::Member { target, member } if matches!(**target, Expr::Parameter(_)) => {
                Some(member)
            }
            Expr::Convert { operand, .. } => operand.as_property(),
            _ => None,
        }
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Negate(Box::new(self))
    }
}

macro_rules! impl_arith {
    ($($trait:ident :: $fn:ident => $op:ident),* $(,)?) => {
        $(
            impl<T: Into<Expr>> $trait<T> for Expr {
                type Output = Expr;

                fn $fn(self, rhs: T) -> Expr {
                    self.binary(BinaryOp::$op, rhs)
                }
            }
        )*
    };
}

impl_arith!(Add::add => Add, Sub::sub => Sub, Mul::mul => Mul, Div::div => Div, Rem::rem => Mod);

macro_rules! impl_from_literal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(v: $ty) -> Self {
                    Expr::Constant(v.into())
                }
            }
        )*
    };
}

impl_from_literal!(Value, bool, i32, i64, f64, String, &str);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_detection() {
        assert_eq!(prop("x", "Name").as_property(), Some("Name"));
        assert_eq!(
            prop("x", "Age").convert(ValueKind::Int64).as_property(),
            Some("Age")
        );
        assert_eq!(prop("x", "Customer").member("Name").as_property(), None);
        assert_eq!(constant(1).as_property(), None);
    }

    #[test]
    fn test_parameter_dependence() {
        let scope = Closure::new("Scope").with_field("min", 18).share();

        assert!(prop("x", "Age").gt(scope.read("min")).depends_on_parameter());
        assert!(!scope.read("min").depends_on_parameter());
        assert!(!(constant(1) + scope.read("min")).depends_on_parameter());
        assert!(contains(list_of([1, 2]), prop("x", "Id")).depends_on_parameter());
    }

    #[test]
    fn test_builders_shape() {
        let expr = !prop("x", "Active");
        assert!(matches!(expr, Expr::Not(_)));

        let expr = prop("x", "Age") + 1;
        assert!(matches!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));

        let expr = prop("x", "Name").call("Normalize", vec![]);
        match expr {
            Expr::Call { method, .. } => assert_eq!(method.name(), "Normalize"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_closure_fields() {
        let scope = Closure::new("Scope").with_field("name", "Jo").share();
        assert_eq!(scope.field("name"), Some(&Value::String("Jo".into())));
        assert_eq!(scope.field("missing"), None);
    }
}
