use core::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::{
    any::DependencyId,
    context::ExecutionContext,
    overrides::{top_entry, Faker, OverrideEntry},
    utils::future::BoxFuture,
};

/// Fake factory of an async dependency
pub type AsyncFactoryFn<V> = Arc<dyn Fn() -> BoxFuture<'static, V> + Send + Sync>;

/// Reusable override of an async dependency, the factory is awaited on every resolution
pub type AsyncFaker<V> = Faker<V, AsyncFactoryFn<V>>;

#[must_use]
pub(crate) fn boxed_factory<V, F, Fut>(factory: F) -> AsyncFactoryFn<V>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = V> + Send + 'static,
{
    Arc::new(move || Box::pin(factory()) as BoxFuture<'static, V>)
}

/// First step of every async resolution: the innermost override wins
pub(crate) async fn resolve_override<V>(dependency: DependencyId) -> Option<V>
where
    V: Clone + Send + Sync + 'static,
{
    let entry = top_entry::<V, AsyncFactoryFn<V>>(&ExecutionContext::current(), dependency)?;
    let value = match &*entry {
        OverrideEntry::Value(value) => value.clone(),
        OverrideEntry::Factory(factory) => factory().await,
    };
    debug!("Resolved from override");
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::{boxed_factory, resolve_override, AsyncFaker};
    use crate::{any::DependencyInfo, overrides::FakeValue};

    use core::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_async_overrides() {
        let dependency = DependencyInfo::of::<u8>();
        let call_count = Arc::new(AtomicU8::new(0));
        let faker: AsyncFaker<u8> = AsyncFaker::new(dependency, {
            let call_count = call_count.clone();
            boxed_factory(move || {
                let call_count = call_count.clone();
                async move { call_count.fetch_add(1, Ordering::SeqCst) }
            })
        });

        assert_eq!(resolve_override::<u8>(dependency.id).await, None);

        let guard = faker.enter();
        assert_eq!(resolve_override::<u8>(dependency.id).await, Some(0));
        assert_eq!(resolve_override::<u8>(dependency.id).await, Some(1));
        {
            let _fake = FakeValue::push::<super::AsyncFactoryFn<u8>>(dependency, 10u8);
            tokio::task::yield_now().await;
            assert_eq!(resolve_override::<u8>(dependency.id).await, Some(10));
        }
        assert_eq!(resolve_override::<u8>(dependency.id).await, Some(2));
        drop(guard);

        assert_eq!(resolve_override::<u8>(dependency.id).await, None);
    }
}
