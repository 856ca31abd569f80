use core::{
    ops::Deref,
    sync::atomic::{AtomicU64, Ordering},
};
use std::sync::Arc;
use tracing::debug;

use crate::{
    any::{DependencyId, DependencyInfo},
    context::{ContextId, ExecutionContext, OverrideRecord},
};

pub(crate) enum OverrideEntry<V, F> {
    Value(V),
    Factory(F),
}

pub(crate) type FactoryFn<V> = Arc<dyn Fn() -> V + Send + Sync>;

#[inline]
fn next_entry_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Keeps one override active in the context it was pushed in.
///
/// Releasing (or dropping) the guard pops exactly the entry it pushed.
/// Overrides of one dependency in one context must be released in reverse order of creation.
///
/// # Panics
/// Releasing or dropping a guard whose entry isn't on top of the stack panics with [`StackCorruption`](crate::StackCorruption).
/// If the thread is already unwinding, the corruption is logged instead.
#[must_use = "the override is removed as soon as the guard is dropped"]
pub struct OverrideGuard {
    context: Arc<ExecutionContext>,
    dependency: DependencyInfo,
    entry_id: u64,
    released: bool,
}

impl OverrideGuard {
    pub(crate) fn push<V, F>(dependency: DependencyInfo, entry: OverrideEntry<V, F>) -> Self
    where
        V: Send + Sync + 'static,
        F: Send + Sync + 'static,
    {
        let context = ExecutionContext::current();
        let entry_id = next_entry_id();
        let depth = context.push_override(
            dependency.id,
            OverrideRecord {
                entry_id,
                entry: Arc::new(entry),
            },
        );
        debug!(%dependency, context = %context.id(), entry_id, depth, "Override pushed");

        Self {
            context,
            dependency,
            entry_id,
            released: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.context.id()
    }

    #[inline]
    #[must_use]
    pub fn dependency(&self) -> DependencyInfo {
        self.dependency
    }

    /// Pops the override
    ///
    /// # Panics
    /// Panics with [`StackCorruption`](crate::StackCorruption) if the entry wasn't on top of its stack
    pub fn release(mut self) {
        self.released = true;
        self.pop();
    }

    fn pop(&self) {
        if let Err(err) = self.context.pop_override(&self.dependency, self.entry_id) {
            err.raise();
            return;
        }
        debug!(dependency = %self.dependency, context = %self.context.id(), entry_id = self.entry_id, "Override popped");
    }
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.pop();
    }
}

#[must_use]
pub(crate) fn top_entry<V, F>(context: &ExecutionContext, dependency: DependencyId) -> Option<Arc<OverrideEntry<V, F>>>
where
    V: Send + Sync + 'static,
    F: Send + Sync + 'static,
{
    context.top_override(dependency).map(|entry| {
        entry
            .downcast::<OverrideEntry<V, F>>()
            .expect("Override entry type should match its dependency")
    })
}

/// First step of every sync resolution: the innermost override wins
#[must_use]
pub(crate) fn resolve_override<V>(context: &ExecutionContext, dependency: DependencyId) -> Option<V>
where
    V: Clone + Send + Sync + 'static,
{
    let entry = top_entry::<V, FactoryFn<V>>(context, dependency)?;
    let value = match &*entry {
        OverrideEntry::Value(value) => value.clone(),
        OverrideEntry::Factory(factory) => factory(),
    };
    debug!("Resolved from override");
    Some(value)
}

/// Override with a fixed value, active while the guard lives.
///
/// Derefs to the faked value, so tests can assert against it.
#[must_use = "the override is removed as soon as the guard is dropped"]
pub struct FakeValue<V> {
    value: V,
    guard: OverrideGuard,
}

impl<V> FakeValue<V> {
    #[inline]
    pub(crate) fn push<F>(dependency: DependencyInfo, value: V) -> Self
    where
        V: Clone + Send + Sync + 'static,
        F: Send + Sync + 'static,
    {
        let guard = OverrideGuard::push::<V, F>(dependency, OverrideEntry::Value(value.clone()));
        Self { value, guard }
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    #[must_use]
    pub fn guard(&self) -> &OverrideGuard {
        &self.guard
    }

    /// Pops the override and gives the value back
    ///
    /// # Panics
    /// Panics with [`StackCorruption`](crate::StackCorruption) if the override wasn't on top of its stack
    pub fn release(self) -> V {
        let Self { value, guard } = self;
        guard.release();
        value
    }
}

impl<V> Deref for FakeValue<V> {
    type Target = V;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// Reusable override constructor.
///
/// Every [`Faker::enter`] activates the factory until the returned guard is dropped.
/// While active, each resolution calls the factory again, so fakes can differ between calls.
pub struct Faker<V, F = FactoryFn<V>> {
    dependency: DependencyInfo,
    factory: F,
    _value: core::marker::PhantomData<fn() -> V>,
}

impl<V, F: Clone> Clone for Faker<V, F> {
    fn clone(&self) -> Self {
        Self {
            dependency: self.dependency,
            factory: self.factory.clone(),
            _value: core::marker::PhantomData,
        }
    }
}

impl<V, F> Faker<V, F>
where
    V: Send + Sync + 'static,
    F: Clone + Send + Sync + 'static,
{
    #[inline]
    #[must_use]
    pub(crate) fn new(dependency: DependencyInfo, factory: F) -> Self {
        Self {
            dependency,
            factory,
            _value: core::marker::PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn dependency(&self) -> DependencyInfo {
        self.dependency
    }

    #[inline]
    pub fn enter(&self) -> OverrideGuard {
        OverrideGuard::push::<V, F>(self.dependency, OverrideEntry::Factory(self.factory.clone()))
    }

    /// Runs `f` with the fake active
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }
}
