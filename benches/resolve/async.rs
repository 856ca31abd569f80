#![allow(dead_code)]

use criterion::{criterion_group, criterion_main, Criterion};
use diwrap::{
    async_impl::{AsyncContextualDependency, AsyncDependency},
    InstantiateErrorKind,
};
use std::sync::Arc;
use tokio::runtime::Builder;

struct A;

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("async_resolve_transient", |b| {
        let dependency = AsyncDependency::new(|| async { Ok::<_, InstantiateErrorKind>(Arc::new(A)) });
        b.to_async(Builder::new_current_thread().build().unwrap()).iter(|| {
            let dependency = dependency.clone();
            async move { dependency.resolve().await.unwrap() }
        });
    })
    .bench_function("async_resolve_cached", |b| {
        let dependency = AsyncDependency::cached(|| async { Ok::<_, InstantiateErrorKind>(Arc::new(A)) });
        b.to_async(Builder::new_current_thread().build().unwrap()).iter(|| {
            let dependency = dependency.clone();
            async move { dependency.resolve().await.unwrap() }
        });
    })
    .bench_function("async_ensure_contextual", |b| {
        let dependency = AsyncContextualDependency::with_finalizer(
            || async { Ok::<_, InstantiateErrorKind>(A) },
            |_: Arc<A>| async {},
        );
        let ensured = dependency.ensure(|()| async {});
        b.to_async(Builder::new_current_thread().build().unwrap()).iter(|| {
            let ensured = ensured.clone();
            async move { ensured.call(()).await.unwrap() }
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
