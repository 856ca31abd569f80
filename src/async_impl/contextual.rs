use core::{
    fmt::{self, Debug, Formatter},
    future::Future,
};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, debug_span, warn, Instrument as _};

use super::{
    finalizer::{boxed_finalizer, BoxedFinalizer, Finalizer},
    inject::{AsyncEnsured, AsyncInjected},
    instantiator::{boxed_instantiator, BoxedInstantiator, Instantiator},
    overrides::{boxed_factory, resolve_override, AsyncFactoryFn, AsyncFaker},
};
use crate::{
    any::{DependencyId, DependencyInfo},
    config::ScopeConfig,
    context::{ContextId, ExecutionContext},
    dependency::Kind,
    errors::{InstantiateErrorKind, ResolveErrorKind},
    leak,
    overrides::FakeValue,
    scope::{self, Released, ScopeHandle},
};

struct ContextualInner<T, E> {
    info: DependencyInfo,
    config: ScopeConfig,
    instantiator: BoxedInstantiator<T, E>,
    finalizer: Option<BoxedFinalizer<T>>,
}

/// Contextual dependency with async acquisition and release
pub struct AsyncContextualDependency<T, E = InstantiateErrorKind> {
    inner: Arc<ContextualInner<T, E>>,
}

impl<T, E> AsyncContextualDependency<T, E>
where
    T: Send + Sync + 'static,
    E: From<ResolveErrorKind> + Send + 'static,
{
    #[inline]
    #[must_use]
    pub fn new(instantiator: impl Instantiator<Provides = T, Error = E>) -> Self {
        Self::build(boxed_instantiator(instantiator), None, ScopeConfig::default())
    }

    #[inline]
    #[must_use]
    pub fn with_finalizer(instantiator: impl Instantiator<Provides = T, Error = E>, finalizer: impl Finalizer<T>) -> Self {
        Self::build(boxed_instantiator(instantiator), Some(boxed_finalizer(finalizer)), ScopeConfig::default())
    }

    #[inline]
    #[must_use]
    pub fn with_config(instantiator: impl Instantiator<Provides = T, Error = E>, config: ScopeConfig) -> Self {
        Self::build(boxed_instantiator(instantiator), None, config)
    }

    #[inline]
    #[must_use]
    pub fn with_finalizer_and_config(
        instantiator: impl Instantiator<Provides = T, Error = E>,
        finalizer: impl Finalizer<T>,
        config: ScopeConfig,
    ) -> Self {
        Self::build(boxed_instantiator(instantiator), Some(boxed_finalizer(finalizer)), config)
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
        Kind::AsyncContextual
    }

    /// Opens a scope in the current context, awaiting the acquisition if needed
    ///
    /// # Errors
    /// Returns the error of the acquisition unchanged
    pub async fn enter(&self) -> Result<AsyncScopeGuard<T>, E> {
        let span = debug_span!("enter", dependency = %self.inner.info);

        async {
            let context = ExecutionContext::current();
            let handle = match scope::reuse(&context, &self.inner.info) {
                Some(handle) => handle,
                None => {
                    let resource = (self.inner.instantiator)().await?;
                    scope::publish(&context, self.inner.info, Arc::new(resource))
                }
            };

            Ok(AsyncScopeGuard {
                context,
                handle,
                finalizer: self.inner.finalizer.clone(),
                config: self.inner.config,
                exited: false,
            })
        }
        .instrument(span)
        .await
    }

    /// Awaits `future` inside a scope.
    /// If the returned future is dropped before completion, the scope is released anyway.
    ///
    /// # Errors
    /// - The error of the acquisition, `future` isn't polled in this case.
    /// - [`ResolveErrorKind::DependencyLeak`] if references to the resource outlived the outermost scope.
    pub async fn scope<F: Future>(&self, future: F) -> Result<F::Output, E> {
        let guard = self.enter().await?;
        let result = future.await;
        guard.exit().await?;
        Ok(result)
    }

    #[inline]
    #[must_use]
    pub fn ensure<F>(&self, task: F) -> AsyncEnsured<T, E, F> {
        AsyncEnsured::new(self.clone(), task)
    }

    /// Resolves the resource of the innermost scope in the current context
    ///
    /// # Errors
    /// - [`ResolveErrorKind::MissingContext`] if no scope is open in the current context.
    /// - [`ResolveErrorKind::DependencyLeak`] if the scope was inherited and its owner already closed it.
    pub async fn resolve(&self) -> Result<Arc<T>, E> {
        let span = debug_span!("resolve", dependency = %self.inner.info);

        async {
            if let Some(value) = resolve_override::<Arc<T>>(self.inner.info.id).await {
                return Ok(value);
            }
            scope::resolve_scoped(&ExecutionContext::current(), &self.inner.info).map_err(E::from)
        }
        .instrument(span)
        .await
    }

    #[inline]
    #[must_use]
    pub fn inject<F>(&self, param: &'static str, task: F) -> AsyncInjected<Self, F> {
        AsyncInjected::new(self.clone(), param, task)
    }

    #[inline]
    pub fn fake_value(&self, value: impl Into<Arc<T>>) -> FakeValue<Arc<T>> {
        FakeValue::push::<AsyncFactoryFn<Arc<T>>>(self.inner.info, value.into())
    }

    #[inline]
    #[must_use]
    pub fn faker<F, Fut>(&self, factory: F) -> AsyncFaker<Arc<T>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Arc<T>> + Send + 'static,
    {
        AsyncFaker::new(self.inner.info, boxed_factory(factory))
    }
}

impl<T, E> Clone for AsyncContextualDependency<T, E> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> PartialEq for AsyncContextualDependency<T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.info == other.inner.info
    }
}

impl<T, E> Eq for AsyncContextualDependency<T, E> {}

impl<T, E> Debug for AsyncContextualDependency<T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncContextualDependency")
            .field("info", &self.inner.info)
            .field("config", &self.inner.config)
            .field("finalizer", &self.inner.finalizer.is_some())
            .finish_non_exhaustive()
    }
}

/// Keeps a scope of an async contextual dependency open.
///
/// Close it with [`AsyncScopeGuard::exit`] to await the finalizer.
/// A guard dropped without `exit`, for example because its task was cancelled, releases
/// the scope immediately and spawns the finalizer on the current tokio runtime.
/// Without a runtime the resource is dropped without finalization.
#[must_use = "the scope is closed as soon as the guard is dropped"]
pub struct AsyncScopeGuard<T: Send + Sync + 'static> {
    context: Arc<ExecutionContext>,
    handle: Arc<ScopeHandle>,
    finalizer: Option<BoxedFinalizer<T>>,
    config: ScopeConfig,
    exited: bool,
}

impl<T: Send + Sync + 'static> AsyncScopeGuard<T> {
    #[inline]
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.context.id()
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.handle.depth()
    }

    /// Closes the scope, awaiting the finalizer if this is the outermost scope
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::DependencyLeak`] if references to the resource outlived the outermost scope.
    /// The resource is released before the error is returned.
    ///
    /// # Panics
    /// Panics if the scope isn't the innermost one of its dependency in the context
    pub async fn exit(mut self) -> Result<(), ResolveErrorKind> {
        self.exited = true;

        let Some(Released { resource, corruption }) = scope::leave(&self.context, &self.handle) else {
            return Ok(());
        };

        let result = match resource {
            Some(resource) => {
                let resource = scope::downcast::<T>(resource);
                let outstanding = leak::outstanding(&resource);
                match &self.finalizer {
                    Some(finalizer) => {
                        finalizer(resource).await;
                        debug!("Finalizer called");
                    }
                    None => drop(resource),
                }
                debug!("Released");
                leak::check_released(self.handle.dependency(), outstanding, self.config)
            }
            None => Ok(()),
        };

        scope::report(corruption);
        result
    }
}

impl<T: Send + Sync + 'static> Drop for AsyncScopeGuard<T> {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;

        let Some(Released { resource, corruption }) = scope::leave(&self.context, &self.handle) else {
            return;
        };

        if let Some(resource) = resource {
            let resource = scope::downcast::<T>(resource);
            let outstanding = leak::outstanding(&resource);
            match (&self.finalizer, Handle::try_current()) {
                (Some(finalizer), Ok(runtime)) => {
                    runtime.spawn(finalizer(resource));
                    debug!("Finalizer spawned");
                }
                (Some(_), Err(_)) => {
                    drop(resource);
                    warn!("No runtime to finalize the resource of a cancelled scope, dropped it");
                }
                (None, _) => drop(resource),
            }
            debug!("Released on drop");

            if let Err(err) = leak::check_released(self.handle.dependency(), outstanding, self.config) {
                warn!(%err, "Scope closed on drop");
            }
        }

        scope::report(corruption);
    }
}
