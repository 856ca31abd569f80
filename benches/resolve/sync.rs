#![allow(dead_code)]

use criterion::{criterion_group, criterion_main, Criterion};
use diwrap::{ContextualDependency, Dependency, DependencyResolver as _, InstantiateErrorKind};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C;

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("resolve_transient", |b| {
        let dependency = Dependency::new(|| Ok::<_, InstantiateErrorKind>(Arc::new(B(2))));
        b.iter(|| dependency.resolve().unwrap());
    })
    .bench_function("resolve_cached", |b| {
        let dependency = Dependency::cached(|| Ok::<_, InstantiateErrorKind>(Arc::new(B(2))));
        b.iter(|| dependency.resolve().unwrap());
    })
    .bench_function("resolve_chained", |b| {
        let b_dep = Dependency::new(|| Ok::<_, InstantiateErrorKind>(Arc::new(B(2))));
        let c_dep = Dependency::cached(|| Ok::<_, InstantiateErrorKind>(Arc::new(C)));
        let a_dep = Dependency::new(move || {
            let (b, c) = (b_dep.clone(), c_dep.clone()).resolve()?;
            Ok::<_, InstantiateErrorKind>(A(b, c))
        });
        b.iter(|| a_dep.resolve().unwrap());
    })
    .bench_function("resolve_override", |b| {
        let dependency = Dependency::new(|| Ok::<_, InstantiateErrorKind>(Arc::new(B(2))));
        let _fake = dependency.fake_value(Arc::new(B(3)));
        b.iter(|| dependency.resolve().unwrap());
    })
    .bench_function("ensure_contextual", |b| {
        let dependency = ContextualDependency::with_finalizer(|| Ok::<_, InstantiateErrorKind>(C), |_: Arc<C>| {});
        let ensured = dependency.ensure(|()| ());
        b.iter(|| ensured.call(()).unwrap());
    })
    .bench_function("resolve_contextual_in_scope", |b| {
        let dependency = ContextualDependency::new(|| Ok::<_, InstantiateErrorKind>(C));
        let guard = dependency.enter().unwrap();
        b.iter(|| drop(dependency.resolve().unwrap()));
        guard.exit().unwrap();
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
