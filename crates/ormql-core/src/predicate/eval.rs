//! Client-side evaluation of captured sub-expressions.
//!
//! A sub-expression that does not touch the entity parameter (a captured
//! variable, an arithmetic expression over captures, a literal list) is
//! compiled once per structural shape into a postfix [`Program`]. A program
//! never stores values: it reads the literals and closures of whichever tree
//! it is run against, in traversal order, so trees that are structurally
//! equal can share one program.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use ormql_proto::{BinaryOp, Closure, Expr, Method, Value, ValueKind};
use tracing::{debug, trace};

use super::hash::{structural_hash, structurally_equal};
use crate::error::{Error, Result};
use crate::stats::CacheStats;

#[derive(Debug, Clone, PartialEq)]
enum Op {
    /// Push the next literal leaf.
    Literal,
    /// Push the next closure leaf.
    Capture,
    Member(String),
    Binary(BinaryOp),
    Not,
    Negate,
    Convert(ValueKind),
    Call {
        method: Method,
        has_target: bool,
        argc: usize,
    },
    List(usize),
}

enum Leaf<'a> {
    Value(&'a Value),
    Closure(&'a Closure),
}

enum Slot<'a> {
    Value(Value),
    Closure(&'a Closure),
}

/// A compiled evaluator for one expression shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    ops: Vec<Op>,
    leaves: usize,
}

impl Program {
    /// Compile an expression that does not reference the entity parameter.
    pub fn compile(expr: &Expr, entity: &str) -> Result<Self> {
        let mut program = Program {
            ops: Vec::new(),
            leaves: 0,
        };
        program.emit(expr, entity)?;
        Ok(program)
    }

    fn emit(&mut self, expr: &Expr, entity: &str) -> Result<()> {
        match expr {
            Expr::Parameter(name) => {
                return Err(Error::not_supported(
                    entity,
                    format!("parameter '{}' cannot be evaluated on the client", name),
                ));
            }
            Expr::Constant(_) => {
                self.ops.push(Op::Literal);
                self.leaves += 1;
            }
            Expr::Closure(_) => {
                self.ops.push(Op::Capture);
                self.leaves += 1;
            }
            Expr::Member { target, member } => {
                self.emit(target, entity)?;
                self.ops.push(Op::Member(member.clone()));
            }
            Expr::Binary { op, left, right } => {
                self.emit(left, entity)?;
                self.emit(right, entity)?;
                self.ops.push(Op::Binary(*op));
            }
            Expr::Not(operand) => {
                self.emit(operand, entity)?;
                self.ops.push(Op::Not);
            }
            Expr::Negate(operand) => {
                self.emit(operand, entity)?;
                self.ops.push(Op::Negate);
            }
            Expr::Convert { to, operand } => {
                self.emit(operand, entity)?;
                self.ops.push(Op::Convert(*to));
            }
            Expr::Call {
                method,
                target,
                args,
            } => {
                if let Method::Named(name) = method {
                    return Err(Error::not_supported(
                        entity,
                        format!("method '{}' is not supported", name),
                    ));
                }
                if let Some(target) = target {
                    self.emit(target, entity)?;
                }
                for arg in args {
                    self.emit(arg, entity)?;
                }
                self.ops.push(Op::Call {
                    method: method.clone(),
                    has_target: target.is_some(),
                    argc: args.len(),
                });
            }
            Expr::List(items) => {
                for item in items {
                    self.emit(item, entity)?;
                }
                self.ops.push(Op::List(items.len()));
            }
        }
        Ok(())
    }

    /// Run the program against `expr`, which must have the compiled shape.
    pub fn run(&self, expr: &Expr, entity: &str) -> Result<Value> {
        let mut leaves = Vec::with_capacity(self.leaves);
        collect_leaves(expr, &mut leaves);
        if leaves.len() != self.leaves {
            return Err(shape_mismatch(entity));
        }

        let mut leaves = leaves.into_iter();
        let mut stack: Vec<Slot<'_>> = Vec::new();

        for op in &self.ops {
            match op {
                Op::Literal => match leaves.next() {
                    Some(Leaf::Value(value)) => stack.push(Slot::Value(value.clone())),
                    _ => return Err(shape_mismatch(entity)),
                },
                Op::Capture => match leaves.next() {
                    Some(Leaf::Closure(closure)) => stack.push(Slot::Closure(closure)),
                    _ => return Err(shape_mismatch(entity)),
                },
                Op::Member(name) => {
                    let value = match stack.pop() {
                        Some(Slot::Closure(closure)) => {
                            closure.field(name).cloned().ok_or_else(|| {
                                Error::evaluation(
                                    entity,
                                    format!(
                                        "captured '{}' has no field '{}'",
                                        closure.type_name, name
                                    ),
                                )
                            })?
                        }
                        Some(Slot::Value(value)) => read_member(&value, name, entity)?,
                        None => return Err(shape_mismatch(entity)),
                    };
                    stack.push(Slot::Value(value));
                }
                Op::Binary(op) => {
                    let right = pop_value(&mut stack, entity)?;
                    let left = pop_value(&mut stack, entity)?;
                    stack.push(Slot::Value(apply_binary(*op, left, right, entity)?));
                }
                Op::Not => {
                    let value = match pop_value(&mut stack, entity)? {
                        Value::Bool(b) => Value::Bool(!b),
                        Value::Null => Value::Null,
                        other => {
                            return Err(Error::evaluation(
                                entity,
                                format!("cannot negate a {:?} value", other.kind()),
                            ))
                        }
                    };
                    stack.push(Slot::Value(value));
                }
                Op::Negate => {
                    let value = pop_value(&mut stack, entity)?;
                    stack.push(Slot::Value(negate(value, entity)?));
                }
                Op::Convert(kind) => {
                    let value = pop_value(&mut stack, entity)?;
                    stack.push(Slot::Value(convert(value, *kind, entity)?));
                }
                Op::Call {
                    method,
                    has_target,
                    argc,
                } => {
                    let mut args = Vec::with_capacity(*argc);
                    for _ in 0..*argc {
                        args.push(pop_value(&mut stack, entity)?);
                    }
                    args.reverse();
                    let target = if *has_target {
                        Some(pop_value(&mut stack, entity)?)
                    } else {
                        None
                    };
                    stack.push(Slot::Value(call(method, target, args, entity)?));
                }
                Op::List(len) => {
                    let mut items = Vec::with_capacity(*len);
                    for _ in 0..*len {
                        items.push(pop_value(&mut stack, entity)?);
                    }
                    items.reverse();
                    stack.push(Slot::Value(Value::List(items)));
                }
            }
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(Slot::Value(value)), true) => Ok(value),
            (Some(Slot::Closure(closure)), true) => Err(Error::evaluation(
                entity,
                format!("captured '{}' cannot be used as a value", closure.type_name),
            )),
            _ => Err(shape_mismatch(entity)),
        }
    }
}

fn collect_leaves<'a>(expr: &'a Expr, out: &mut Vec<Leaf<'a>>) {
    match expr {
        Expr::Parameter(_) => {}
        Expr::Constant(value) => out.push(Leaf::Value(value)),
        Expr::Closure(closure) => out.push(Leaf::Closure(closure)),
        Expr::Member { target, .. } => collect_leaves(target, out),
        Expr::Binary { left, right, .. } => {
            collect_leaves(left, out);
            collect_leaves(right, out);
        }
        Expr::Not(operand) | Expr::Negate(operand) | Expr::Convert { operand, .. } => {
            collect_leaves(operand, out)
        }
        Expr::Call { target, args, .. } => {
            if let Some(target) = target {
                collect_leaves(target, out);
            }
            for arg in args {
                collect_leaves(arg, out);
            }
        }
        Expr::List(items) => {
            for item in items {
                collect_leaves(item, out);
            }
        }
    }
}

fn shape_mismatch(entity: &str) -> Error {
    Error::evaluation(entity, "expression does not match its compiled evaluator")
}

fn pop_value(stack: &mut Vec<Slot<'_>>, entity: &str) -> Result<Value> {
    match stack.pop() {
        Some(Slot::Value(value)) => Ok(value),
        Some(Slot::Closure(closure)) => Err(Error::evaluation(
            entity,
            format!("captured '{}' cannot be used as a value", closure.type_name),
        )),
        None => Err(shape_mismatch(entity)),
    }
}

fn read_member(value: &Value, member: &str, entity: &str) -> Result<Value> {
    match (value, member) {
        (Value::String(s), "Length") => Ok(Value::Int32(s.chars().count() as i32)),
        (Value::List(items), "Count" | "Length") => Ok(Value::Int32(items.len() as i32)),
        (Value::Bytes(bytes), "Length") => Ok(Value::Int32(bytes.len() as i32)),
        (value, "HasValue") => Ok(Value::Bool(!value.is_null())),
        (value, "Value") if !value.is_null() => Ok(value.clone()),
        (value, member) => Err(Error::evaluation(
            entity,
            format!("cannot read '{}' of a {:?} value", member, value.kind()),
        )),
    }
}

enum Numeric {
    Int(i64),
    Float(f64),
}

fn numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Int32(i) => Some(Numeric::Int(*i as i64)),
        Value::Int64(i) => Some(Numeric::Int(*i)),
        Value::Float32(f) => Some(Numeric::Float(*f as f64)),
        Value::Float64(f) => Some(Numeric::Float(*f)),
        _ => None,
    }
}

/// Compare two non-null values, widening numerics.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (numeric(left), numeric(right)) {
        return match (l, r) {
            (Numeric::Int(l), Numeric::Int(r)) => Some(l.cmp(&r)),
            (Numeric::Int(l), Numeric::Float(r)) => (l as f64).partial_cmp(&r),
            (Numeric::Float(l), Numeric::Int(r)) => l.partial_cmp(&(r as f64)),
            (Numeric::Float(l), Numeric::Float(r)) => l.partial_cmp(&r),
        };
    }
    match (left, right) {
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bytes(l), Value::Bytes(r)) => Some(l.cmp(r)),
        (Value::Timestamp(l), Value::Timestamp(r)) => Some(l.cmp(r)),
        (Value::Uuid(l), Value::Uuid(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => compare(left, right) == Some(Ordering::Equal) || left == right,
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value, entity: &str) -> Result<Value> {
    match op {
        BinaryOp::And | BinaryOp::Or => match (&left, &right) {
            (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(if op == BinaryOp::And {
                *l && *r
            } else {
                *l || *r
            })),
            _ => Err(Error::evaluation(
                entity,
                format!("'{}' requires boolean operands", op.sql()),
            )),
        },
        BinaryOp::Coalesce => Ok(if left.is_null() { right } else { left }),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Bool(false));
            }
            let ordering = compare(&left, &right).ok_or_else(|| {
                Error::evaluation(
                    entity,
                    format!(
                        "cannot compare {:?} with {:?}",
                        left.kind(),
                        right.kind()
                    ),
                )
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, left, right, entity)
        }
    }
}

fn arithmetic(op: BinaryOp, left: Value, right: Value, entity: &str) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if let (BinaryOp::Add, Value::String(l), Value::String(r)) = (op, &left, &right) {
        return Ok(Value::String(format!("{}{}", l, r)));
    }

    let overflow = || Error::evaluation(entity, format!("arithmetic overflow in '{}'", op.sql()));
    let div_zero = || Error::evaluation(entity, "division by zero");

    if let (Value::Int32(l), Value::Int32(r)) = (&left, &right) {
        let (l, r) = (*l, *r);
        let result = match op {
            BinaryOp::Add => l.checked_add(r).ok_or_else(overflow)?,
            BinaryOp::Sub => l.checked_sub(r).ok_or_else(overflow)?,
            BinaryOp::Mul => l.checked_mul(r).ok_or_else(overflow)?,
            BinaryOp::Div if r == 0 => return Err(div_zero()),
            BinaryOp::Div => l.checked_div(r).ok_or_else(overflow)?,
            BinaryOp::Mod if r == 0 => return Err(div_zero()),
            _ => l.checked_rem(r).ok_or_else(overflow)?,
        };
        return Ok(Value::Int32(result));
    }

    match (numeric(&left), numeric(&right)) {
        (Some(Numeric::Int(l)), Some(Numeric::Int(r))) => {
            let result = match op {
                BinaryOp::Add => l.checked_add(r).ok_or_else(overflow)?,
                BinaryOp::Sub => l.checked_sub(r).ok_or_else(overflow)?,
                BinaryOp::Mul => l.checked_mul(r).ok_or_else(overflow)?,
                BinaryOp::Div if r == 0 => return Err(div_zero()),
                BinaryOp::Div => l.checked_div(r).ok_or_else(overflow)?,
                BinaryOp::Mod if r == 0 => return Err(div_zero()),
                _ => l.checked_rem(r).ok_or_else(overflow)?,
            };
            Ok(Value::Int64(result))
        }
        (Some(l), Some(r)) => {
            let as_f64 = |n: Numeric| match n {
                Numeric::Int(i) => i as f64,
                Numeric::Float(f) => f,
            };
            let (l, r) = (as_f64(l), as_f64(r));
            Ok(Value::Float64(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                _ => l % r,
            }))
        }
        _ => Err(Error::evaluation(
            entity,
            format!(
                "'{}' is not defined for {:?} and {:?}",
                op.sql(),
                left.kind(),
                right.kind()
            ),
        )),
    }
}

fn negate(value: Value, entity: &str) -> Result<Value> {
    let overflow = || Error::evaluation(entity, "arithmetic overflow in negation");
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int32(i) => i.checked_neg().map(Value::Int32).ok_or_else(overflow),
        Value::Int64(i) => i.checked_neg().map(Value::Int64).ok_or_else(overflow),
        Value::Float32(f) => Ok(Value::Float32(-f)),
        Value::Float64(f) => Ok(Value::Float64(-f)),
        other => Err(Error::evaluation(
            entity,
            format!("cannot negate a {:?} value", other.kind()),
        )),
    }
}

fn convert(value: Value, to: ValueKind, entity: &str) -> Result<Value> {
    if value.is_null() || value.kind() == to {
        return Ok(value);
    }
    let from = value.kind();
    let failed = || Error::evaluation(entity, format!("cannot convert {:?} to {:?}", from, to));

    let converted = match (&value, to) {
        (Value::Int32(i), ValueKind::Int64) => Value::Int64(*i as i64),
        (Value::Int32(i), ValueKind::Float32) => Value::Float32(*i as f32),
        (Value::Int32(i), ValueKind::Float64) => Value::Float64(*i as f64),
        (Value::Int64(i), ValueKind::Int32) => {
            Value::Int32(i32::try_from(*i).map_err(|_| failed())?)
        }
        (Value::Int64(i), ValueKind::Float32) => Value::Float32(*i as f32),
        (Value::Int64(i), ValueKind::Float64) => Value::Float64(*i as f64),
        (Value::Int64(i), ValueKind::Timestamp) => Value::Timestamp(*i),
        (Value::Timestamp(t), ValueKind::Int64) => Value::Int64(*t),
        (Value::Float32(f), ValueKind::Float64) => Value::Float64(*f as f64),
        (Value::Float64(f), ValueKind::Float32) => Value::Float32(*f as f32),
        (Value::Float32(_) | Value::Float64(_), ValueKind::Int32 | ValueKind::Int64) => {
            let f = value.as_f64().ok_or_else(failed)?;
            if !f.is_finite() {
                return Err(failed());
            }
            if to == ValueKind::Int32 {
                Value::Int32(i32::try_from(f.trunc() as i64).map_err(|_| failed())?)
            } else {
                Value::Int64(f.trunc() as i64)
            }
        }
        _ => return Err(failed()),
    };
    Ok(converted)
}

fn call(method: &Method, target: Option<Value>, args: Vec<Value>, entity: &str) -> Result<Value> {
    let name = method.name();
    let null_target = || Error::evaluation(entity, format!("'{}' called on a null value", name));
    let bad_arguments = || Error::evaluation(entity, format!("invalid arguments to '{}'", name));

    match (method, target) {
        (Method::ToLower | Method::ToUpper | Method::Trim, Some(target)) => {
            let s = match target {
                Value::String(s) => s,
                Value::Null => return Err(null_target()),
                _ => return Err(bad_arguments()),
            };
            Ok(Value::String(match method {
                Method::ToLower => s.to_lowercase(),
                Method::ToUpper => s.to_uppercase(),
                _ => s.trim().to_string(),
            }))
        }
        (Method::Contains, None) => match args.as_slice() {
            [Value::List(items), item] => {
                Ok(Value::Bool(items.iter().any(|v| values_equal(v, item))))
            }
            [Value::Null, _] => Err(null_target()),
            _ => Err(bad_arguments()),
        },
        (Method::Contains | Method::StartsWith | Method::EndsWith, Some(target)) => {
            match (target, args.as_slice()) {
                (Value::Null, _) => Err(null_target()),
                (Value::List(items), [item]) if *method == Method::Contains => {
                    Ok(Value::Bool(items.iter().any(|v| values_equal(v, item))))
                }
                (Value::String(s), [Value::String(arg)]) => Ok(Value::Bool(match method {
                    Method::Contains => s.contains(arg.as_str()),
                    Method::StartsWith => s.starts_with(arg.as_str()),
                    _ => s.ends_with(arg.as_str()),
                })),
                _ => Err(bad_arguments()),
            }
        }
        (Method::Named(name), _) => Err(Error::not_supported(
            entity,
            format!("method '{}' is not supported", name),
        )),
        _ => Err(bad_arguments()),
    }
}

/// Process-wide cache of compiled evaluators keyed by structural hash.
///
/// Each hash bucket holds the shapes that produced it, so colliding shapes
/// are told apart by [`structurally_equal`]. When the cache grows past its
/// capacity it is cleared wholesale. Inserts for one hash are serialized by
/// the bucket's shard lock, so a shape is compiled at most once between clears.
#[derive(Debug)]
pub struct EvaluatorCache {
    entries: DashMap<u64, Vec<(Expr, Arc<Program>)>>,
    len: AtomicUsize,
    capacity: usize,
    stats: CacheStats,
}

impl EvaluatorCache {
    /// Create a cache holding at most `capacity` compiled shapes.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            len: AtomicUsize::new(0),
            capacity,
            stats: CacheStats::default(),
        }
    }

    /// Evaluate `expr`, compiling its shape on first use.
    pub fn evaluate(&self, expr: &Expr, entity: &str) -> Result<Value> {
        self.program_for(expr, entity)?.run(expr, entity)
    }

    /// Get or compile the evaluator for `expr`'s shape.
    pub fn program_for(&self, expr: &Expr, entity: &str) -> Result<Arc<Program>> {
        let hash = structural_hash(expr);

        if let Some(program) = self.lookup(hash, expr) {
            self.stats.record_hit();
            return Ok(program);
        }

        if self.len.load(AtomicOrdering::Relaxed) >= self.capacity {
            self.clear();
        }

        let mut bucket = self.entries.entry(hash).or_default();
        if let Some((_, program)) = bucket
            .iter()
            .find(|(shape, _)| structurally_equal(shape, expr))
        {
            // Another thread compiled it while we waited for the shard
            self.stats.record_hit();
            return Ok(Arc::clone(program));
        }

        let program = Arc::new(Program::compile(expr, entity)?);
        bucket.push((expr.clone(), Arc::clone(&program)));
        self.len.fetch_add(1, AtomicOrdering::Relaxed);
        self.stats.record_miss();

        trace!(hash, ops = program.ops.len(), "compiled evaluator");
        Ok(program)
    }

    fn lookup(&self, hash: u64, expr: &Expr) -> Option<Arc<Program>> {
        let bucket = self.entries.get(&hash)?;
        bucket
            .iter()
            .find(|(shape, _)| structurally_equal(shape, expr))
            .map(|(_, program)| Arc::clone(program))
    }

    /// Drop every compiled evaluator.
    pub fn clear(&self) {
        let dropped = self.len.swap(0, AtomicOrdering::Relaxed);
        self.entries.clear();
        self.stats.record_evictions(dropped as u64);
        debug!(dropped, capacity = self.capacity, "evaluator cache cleared");
    }

    /// Number of compiled shapes currently cached.
    pub fn len(&self) -> usize {
        self.len.load(AtomicOrdering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Default for EvaluatorCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormql_proto::{constant, contains, list_of, prop, Closure};

    fn eval(expr: &Expr) -> Result<Value> {
        EvaluatorCache::new(16).evaluate(expr, "Test")
    }

    #[test]
    fn test_closure_field_read() {
        let scope = Closure::new("Scope").with_field("min", 18).share();
        assert_eq!(eval(&scope.read("min")).unwrap(), Value::Int32(18));

        let err = eval(&scope.read("missing")).unwrap_err();
        assert!(err.to_string().contains("'missing'"));
    }

    #[test]
    fn test_arithmetic_and_coalesce() {
        let scope = Closure::new("Scope")
            .with_field("base", 10)
            .with_field("none", Value::Null)
            .share();

        assert_eq!(
            eval(&(scope.read("base") * 2 + 1)).unwrap(),
            Value::Int32(21)
        );
        assert_eq!(
            eval(&(scope.read("base") + 1i64)).unwrap(),
            Value::Int64(11)
        );
        assert_eq!(
            eval(&scope.read("none").coalesce(5)).unwrap(),
            Value::Int32(5)
        );
        assert_eq!(eval(&(scope.read("none") + 1)).unwrap(), Value::Null);
        assert!(eval(&(scope.read("base") / 0)).is_err());
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(
            eval(&constant("  Jo ").trim().to_lower()).unwrap(),
            Value::String("jo".into())
        );
        assert_eq!(
            eval(&constant("John").starts_with("Jo")).unwrap(),
            Value::Bool(true)
        );
        assert!(eval(&constant("x").call("Normalize", vec![])).is_err());
    }

    #[test]
    fn test_list_membership() {
        assert_eq!(
            eval(&contains(list_of([1, 2, 3]), constant(2))).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval(&list_of([1, 2]).contains(constant(5))).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval(&list_of([1, 2])).unwrap(),
            ormql_proto::list([1, 2])
        );
    }

    #[test]
    fn test_comparisons_widen_numerics() {
        assert_eq!(eval(&constant(2).lt(2.5)).unwrap(), Value::Bool(true));
        assert_eq!(
            eval(&constant(3).equals(3i64)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval(&constant(Value::Null).gt(1)).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_convert() {
        let expr = constant(7).convert(ValueKind::Int64);
        assert_eq!(eval(&expr).unwrap(), Value::Int64(7));

        let expr = constant("7").convert(ValueKind::Int32);
        assert!(eval(&expr).is_err());
    }

    #[test]
    fn test_parameter_is_rejected() {
        let err = Program::compile(&prop("x", "Age"), "Person").unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));
    }

    #[test]
    fn test_same_shape_shares_program_but_not_values() {
        let cache = EvaluatorCache::new(16);
        let first = Closure::new("Scope").with_field("min", 18).share();
        let second = Closure::new("Scope").with_field("min", 30).share();

        assert_eq!(
            cache.evaluate(&first.read("min"), "Person").unwrap(),
            Value::Int32(18)
        );
        assert_eq!(
            cache.evaluate(&second.read("min"), "Person").unwrap(),
            Value::Int32(30)
        );

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_overflow_clears_wholesale() {
        let cache = EvaluatorCache::new(2);
        let scope = Closure::new("Scope")
            .with_field("a", 1)
            .with_field("b", 2)
            .with_field("c", 3)
            .share();

        cache.evaluate(&scope.read("a"), "T").unwrap();
        cache.evaluate(&scope.read("b"), "T").unwrap();
        assert_eq!(cache.len(), 2);

        cache.evaluate(&scope.read("c"), "T").unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions(), 2);

        // Still correct after the reset
        assert_eq!(
            cache.evaluate(&scope.read("a"), "T").unwrap(),
            Value::Int32(1)
        );
    }

    #[test]
    fn test_concurrent_evaluation() {
        let cache = Arc::new(EvaluatorCache::new(4));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let scope = Closure::new("Scope").with_field("v", i).share();
                    for _ in 0..100 {
                        let value = cache.evaluate(&(scope.read("v") + 1), "T").unwrap();
                        assert_eq!(value, Value::Int32(i + 1));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.stats().misses(), 1);
    }
}
