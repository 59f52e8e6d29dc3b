//! Structural hashing and equality of predicate trees.
//!
//! Both functions look at shape only: bound parameter names, literal values
//! and the fields of captured closures are ignored. Only a constant's kind and
//! a closure's declared type are significant. Two trees that compare equal
//! always hash equal; every arm below has a matching arm in [`structurally_equal`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::mem::discriminant;

use ormql_proto::Expr;

/// Hash of a tree's shape, independent of parameter names and values.
pub fn structural_hash(expr: &Expr) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_into(expr, &mut hasher);
    hasher.finish()
}

fn hash_into<H: Hasher>(expr: &Expr, hasher: &mut H) {
    discriminant(expr).hash(hasher);

    match expr {
        Expr::Parameter(_) => {}
        Expr::Member { target, member } => {
            member.hash(hasher);
            hash_into(target, hasher);
        }
        Expr::Constant(value) => value.kind().hash(hasher),
        Expr::Closure(closure) => closure.type_name.hash(hasher),
        Expr::Binary { op, left, right } => {
            op.hash(hasher);
            hash_into(left, hasher);
            hash_into(right, hasher);
        }
        Expr::Not(operand) | Expr::Negate(operand) => hash_into(operand, hasher),
        Expr::Convert { to, operand } => {
            to.hash(hasher);
            hash_into(operand, hasher);
        }
        Expr::Call {
            method,
            target,
            args,
        } => {
            method.hash(hasher);
            target.is_some().hash(hasher);
            if let Some(target) = target {
                hash_into(target, hasher);
            }
            args.len().hash(hasher);
            for arg in args {
                hash_into(arg, hasher);
            }
        }
        Expr::List(items) => {
            items.len().hash(hasher);
            for item in items {
                hash_into(item, hasher);
            }
        }
    }
}

/// Shape equality matching [`structural_hash`].
pub fn structurally_equal(a: &Expr, b: &Expr) -> bool {
    match (a, b) {
        (Expr::Parameter(_), Expr::Parameter(_)) => true,
        (
            Expr::Member {
                target: ta,
                member: ma,
            },
            Expr::Member {
                target: tb,
                member: mb,
            },
        ) => ma == mb && structurally_equal(ta, tb),
        (Expr::Constant(va), Expr::Constant(vb)) => va.kind() == vb.kind(),
        (Expr::Closure(ca), Expr::Closure(cb)) => ca.type_name == cb.type_name,
        (
            Expr::Binary {
                op: oa,
                left: la,
                right: ra,
            },
            Expr::Binary {
                op: ob,
                left: lb,
                right: rb,
            },
        ) => oa == ob && structurally_equal(la, lb) && structurally_equal(ra, rb),
        (Expr::Not(a), Expr::Not(b)) | (Expr::Negate(a), Expr::Negate(b)) => {
            structurally_equal(a, b)
        }
        (
            Expr::Convert {
                to: ka,
                operand: oa,
            },
            Expr::Convert {
                to: kb,
                operand: ob,
            },
        ) => ka == kb && structurally_equal(oa, ob),
        (
            Expr::Call {
                method: ma,
                target: ta,
                args: aa,
            },
            Expr::Call {
                method: mb,
                target: tb,
                args: ab,
            },
        ) => {
            let targets_equal = match (ta, tb) {
                (Some(ta), Some(tb)) => structurally_equal(ta, tb),
                (None, None) => true,
                _ => false,
            };
            ma == mb && targets_equal && all_equal(aa, ab)
        }
        (Expr::List(ia), Expr::List(ib)) => all_equal(ia, ib),
        _ => false,
    }
}

fn all_equal(a: &[Expr], b: &[Expr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structurally_equal(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormql_proto::{constant, contains, list_of, param, prop, Closure, ValueKind};

    fn sample_trees() -> Vec<Expr> {
        let scope = Closure::new("Scope").with_field("min", 18).share();
        let other = Closure::new("Other").with_field("min", 18).share();

        vec![
            param("x"),
            param("y"),
            prop("x", "Age"),
            prop("y", "Age"),
            prop("x", "Name"),
            constant(1),
            constant(2),
            constant(1i64),
            constant("a"),
            Expr::Constant(ormql_proto::Value::Null),
            scope.read("min"),
            scope.read("max"),
            other.read("min"),
            prop("x", "Age").gt(scope.read("min")),
            prop("y", "Age").gt(other.read("min")),
            prop("x", "Age").gte(scope.read("min")),
            prop("x", "Age").gt(1).and(prop("x", "Name").equals("a")),
            prop("x", "Age").gt(1).or(prop("x", "Name").equals("a")),
            !prop("x", "Active"),
            -(prop("x", "Age")),
            prop("x", "Age").convert(ValueKind::Int64),
            prop("x", "Age").convert(ValueKind::Float64),
            prop("x", "Name").starts_with("Jo"),
            prop("x", "Name").ends_with("Jo"),
            prop("x", "Name").call("Normalize", vec![]),
            prop("x", "Name").call("Normalize", vec![constant(1)]),
            contains(list_of([1, 2]), prop("x", "Id")),
            contains(list_of([1, 2, 3]), prop("x", "Id")),
            list_of([1, 2]).contains(prop("x", "Id")),
            list_of(Vec::<i32>::new()),
        ]
    }

    #[test]
    fn test_parameter_names_are_ignored() {
        let a = prop("x", "Age").gt(18);
        let b = prop("customer", "Age").gt(18);

        assert!(structurally_equal(&a, &b));
        assert_eq!(structural_hash(&a), structural_hash(&b));
    }

    #[test]
    fn test_values_are_ignored_but_kinds_are_not() {
        assert!(structurally_equal(&constant(1), &constant(99)));
        assert!(!structurally_equal(&constant(1), &constant(1i64)));
        assert!(!structurally_equal(
            &constant(1),
            &Expr::Constant(ormql_proto::Value::Null)
        ));
    }

    #[test]
    fn test_closures_compare_by_type_only() {
        let a = Closure::new("Scope").with_field("min", 18).share();
        let b = Closure::new("Scope")
            .with_field("min", 30)
            .with_field("extra", "ignored")
            .share();

        assert!(structurally_equal(&a.read("min"), &b.read("min")));
        assert_eq!(
            structural_hash(&a.read("min")),
            structural_hash(&b.read("min"))
        );
        assert!(!structurally_equal(&a.read("min"), &a.read("max")));
    }

    #[test]
    fn test_member_names_matter() {
        assert!(!structurally_equal(&prop("x", "Age"), &prop("x", "Name")));
    }

    #[test]
    fn test_equal_implies_equal_hash() {
        let trees = sample_trees();
        for a in &trees {
            for b in &trees {
                if structurally_equal(a, b) {
                    assert_eq!(
                        structural_hash(a),
                        structural_hash(b),
                        "{a:?} and {b:?} are equal but hash differently"
                    );
                }
            }
        }
    }

    #[test]
    fn test_equality_is_symmetric_and_reflexive() {
        let trees = sample_trees();
        for a in &trees {
            assert!(structurally_equal(a, a));
            for b in &trees {
                assert_eq!(structurally_equal(a, b), structurally_equal(b, a));
            }
        }
    }

    #[test]
    fn test_each_equality_class_has_its_own_hash() {
        let trees = sample_trees();

        let mut classes: Vec<&Expr> = Vec::new();
        for tree in &trees {
            if !classes.iter().any(|c| structurally_equal(c, tree)) {
                classes.push(tree);
            }
        }

        let hashes: std::collections::HashSet<u64> =
            trees.iter().map(structural_hash).collect();
        assert_eq!(hashes.len(), classes.len());
    }
}
