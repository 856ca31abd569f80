use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::debug_span;

use crate::{
    any::{DependencyId, DependencyInfo},
    config::ScopeConfig,
    context::ExecutionContext,
    dependency::Kind,
    errors::{InstantiateErrorKind, ResolveErrorKind},
    finalizer::{BoxedFinalizer, Finalizer},
    inject::{Ensured, Injected},
    instantiator::{BoxedInstantiator, Instantiator},
    overrides::{resolve_override, FactoryFn, FakeValue, Faker},
    scope::{self, ScopeGuard},
};

struct ContextualInner<T, E> {
    info: DependencyInfo,
    config: ScopeConfig,
    instantiator: BoxedInstantiator<T, E>,
    finalizer: Option<BoxedFinalizer<T>>,
}

/// Dependency owning a resource that is valid only inside an explicit scope.
///
/// The resource is acquired when the outermost scope of a context opens and released
/// when it closes. Nested scopes in the same context reuse it.
/// Resolving the dependency outside of any scope fails with [`ResolveErrorKind::MissingContext`].
pub struct ContextualDependency<T, E = InstantiateErrorKind> {
    inner: Arc<ContextualInner<T, E>>,
}

impl<T, E> ContextualDependency<T, E>
where
    T: Send + Sync + 'static,
    E: From<ResolveErrorKind> + 'static,
{
    #[inline]
    #[must_use]
    pub fn new(instantiator: impl Instantiator<Provides = T, Error = E>) -> Self {
        Self::build(Arc::new(instantiator), None, ScopeConfig::default())
    }

    #[inline]
    #[must_use]
    pub fn with_finalizer(instantiator: impl Instantiator<Provides = T, Error = E>, finalizer: impl Finalizer<T>) -> Self {
        Self::build(Arc::new(instantiator), Some(Arc::new(finalizer)), ScopeConfig::default())
    }

    #[inline]
    #[must_use]
    pub fn with_config(instantiator: impl Instantiator<Provides = T, Error = E>, config: ScopeConfig) -> Self {
        Self::build(Arc::new(instantiator), None, config)
    }

    #[inline]
    #[must_use]
    pub fn with_finalizer_and_config(
        instantiator: impl Instantiator<Provides = T, Error = E>,
        finalizer: impl Finalizer<T>,
        config: ScopeConfig,
    ) -> Self {
        Self::build(Arc::new(instantiator), Some(Arc::new(finalizer)), config)
    }

    fn build(instantiator: BoxedInstantiator<T, E>, finalizer: Option<BoxedFinalizer<T>>, config: ScopeConfig) -> Self {
        Self {
            inner: Arc::new(ContextualInner {
                info: DependencyInfo::of::<T>(),
                config,
                instantiator,
                finalizer,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn info(&self) -> DependencyInfo {
        self.inner.info
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> DependencyId {
        self.inner.info.id
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> Kind {
        Kind::Contextual
    }

    /// Opens a scope in the current context.
    /// Acquires the resource unless the context already has an open scope of this dependency.
    ///
    /// # Errors
    /// Returns the error of the acquisition unchanged
    pub fn enter(&self) -> Result<ScopeGuard<T>, E> {
        let span = debug_span!("enter", dependency = %self.inner.info);
        let _guard = span.enter();

        let context = ExecutionContext::current();
        let handle = match scope::reuse(&context, &self.inner.info) {
            Some(handle) => handle,
            None => {
                let resource = self.inner.instantiator.instantiate()?;
                scope::publish(&context, self.inner.info, Arc::new(resource))
            }
        };

        Ok(ScopeGuard::new(context, handle, self.inner.finalizer.clone(), self.inner.config))
    }

    /// Runs `f` inside a scope
    ///
    /// # Errors
    /// - The error of the acquisition, `f` isn't called in this case.
    /// - [`ResolveErrorKind::DependencyLeak`] if references to the resource outlived the outermost scope,
    ///   for example because `f` returned one.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> Result<R, E> {
        let guard = self.enter()?;
        let result = f();
        guard.exit()?;
        Ok(result)
    }

    /// Wraps `task` so that every call runs inside a scope
    #[inline]
    #[must_use]
    pub fn ensure<F>(&self, task: F) -> Ensured<T, E, F> {
        Ensured::new(self.clone(), task)
    }

    /// Resolves the resource of the innermost scope in the current context.
    /// The innermost active override wins over the scope.
    ///
    /// # Errors
    /// - [`ResolveErrorKind::MissingContext`] if no scope is open in the current context.
    /// - [`ResolveErrorKind::DependencyLeak`] if the scope was inherited and its owner already closed it.
    pub fn resolve(&self) -> Result<Arc<T>, E> {
        let span = debug_span!("resolve", dependency = %self.inner.info);
        let _guard = span.enter();

        let context = ExecutionContext::current();
        if let Some(value) = resolve_override::<Arc<T>>(&context, self.inner.info.id) {
            return Ok(value);
        }
        scope::resolve_scoped(&context, &self.inner.info).map_err(E::from)
    }

    #[inline]
    #[must_use]
    pub fn inject<F>(&self, param: &'static str, task: F) -> Injected<Self, F> {
        Injected::new(self.clone(), param, task)
    }

    /// Overrides the resource in the current context while the guard lives.
    /// No scope is needed to resolve a faked contextual dependency.
    #[inline]
    pub fn fake_value(&self, value: impl Into<Arc<T>>) -> FakeValue<Arc<T>> {
        FakeValue::push::<FactoryFn<Arc<T>>>(self.inner.info, value.into())
    }

    #[inline]
    #[must_use]
    pub fn faker(&self, factory: impl Fn() -> Arc<T> + Send + Sync + 'static) -> Faker<Arc<T>> {
        Faker::new(self.inner.info, Arc::new(factory) as FactoryFn<Arc<T>>)
    }
}

impl<T, E> Clone for ContextualDependency<T, E> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> PartialEq for ContextualDependency<T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.info == other.inner.info
    }
}

impl<T, E> Eq for ContextualDependency<T, E> {}

impl<T, E> Debug for ContextualDependency<T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualDependency")
            .field("info", &self.inner.info)
            .field("config", &self.inner.config)
            .field("finalizer", &self.inner.finalizer.is_some())
            .finish_non_exhaustive()
    }
}
