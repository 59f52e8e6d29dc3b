//! Predicate compilation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ormql_bench::blog_registry;
use ormql_core::predicate::compile;
use ormql_core::{structural_hash, Dialect, EvaluatorCache, MappingResolver};
use ormql_proto::{list_of, param, prop, Closure, Expr, Predicate};

fn user_filter(min_age: i32) -> Expr {
    let captured = Closure::new("Search").with_field("prefix", "jo").share();
    prop("u", "Name")
        .starts_with(captured.read("prefix"))
        .and(prop("u", "Age").gte(min_age))
        .and(list_of(["active", "trial"]).contains(prop("u", "Status")))
}

fn bench_structural_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate/hash");

    group.bench_function("user_filter", |b| {
        let expr = user_filter(18);
        b.iter(|| black_box(structural_hash(&expr)));
    });

    group.bench_function("parameter_only", |b| {
        let expr = param("u");
        b.iter(|| black_box(structural_hash(&expr)));
    });

    group.finish();
}

fn bench_evaluator_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate/evaluator");
    let captured = Closure::new("Search").with_field("limit", 10).share().read("limit") + 5;

    group.bench_function("warm", |b| {
        let cache = EvaluatorCache::new(1024);
        cache.evaluate(&captured, "User").unwrap();
        b.iter(|| black_box(cache.evaluate(&captured, "User").unwrap()));
    });

    group.bench_function("cold", |b| {
        b.iter(|| {
            let cache = EvaluatorCache::new(1024);
            black_box(cache.evaluate(&captured, "User").unwrap())
        });
    });

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate/compile");
    let registry = blog_registry().unwrap();
    let users = registry.require("User").unwrap();
    let cache = EvaluatorCache::default();

    for dialect in [Dialect::SqlServer, Dialect::Postgres, Dialect::MySql, Dialect::Oracle] {
        group.bench_with_input(
            BenchmarkId::new("user_filter", format!("{:?}", dialect)),
            &dialect,
            |b, dialect| {
                let predicate = Predicate::new("u", user_filter(21));
                b.iter(|| {
                    black_box(compile(&predicate, &users, dialect, Some(true), &cache).unwrap())
                });
            },
        );
    }

    group.bench_function("changing_values", |b| {
        let mut age = 0;
        b.iter(|| {
            age = (age + 1) % 100;
            let predicate = Predicate::new("u", user_filter(age));
            black_box(compile(&predicate, &users, &Dialect::SqlServer, None, &cache).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_structural_hash, bench_evaluator_cache, bench_compile);
criterion_main!(benches);
