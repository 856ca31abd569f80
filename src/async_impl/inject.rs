use core::future::Future;
use tracing::{debug, debug_span, Instrument as _};

use super::{contextual::AsyncContextualDependency, dependency_resolver::AsyncDependencyResolver};
use crate::errors::ResolveErrorKind;

/// Async consumer function with one parameter bound to a dependency
pub struct AsyncInjected<D, F> {
    dependency: D,
    param: &'static str,
    task: F,
}

impl<D, F> AsyncInjected<D, F> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(dependency: D, param: &'static str, task: F) -> Self {
        Self { dependency, param, task }
    }

    #[inline]
    #[must_use]
    pub const fn param(&self) -> &'static str {
        self.param
    }

    #[inline]
    #[must_use]
    pub const fn dependency(&self) -> &D {
        &self.dependency
    }
}

impl<D, F> AsyncInjected<D, F>
where
    D: AsyncDependencyResolver,
{
    /// Resolves the dependency and awaits the task with it
    ///
    /// # Errors
    /// Returns the resolution error, the task isn't called in this case
    pub async fn call<Args, Fut>(&self, args: Args) -> Result<Fut::Output, D::Error>
    where
        F: Fn(D::Provides, Args) -> Fut,
        Fut: Future,
    {
        let span = debug_span!("inject", param = self.param);

        let value = self.dependency.resolve_async().instrument(span).await?;
        Ok((self.task)(value, args).await)
    }

    /// Awaits the task with an explicitly passed value, nothing is resolved
    pub async fn call_with<Args, Fut>(&self, value: D::Provides, args: Args) -> Fut::Output
    where
        F: Fn(D::Provides, Args) -> Fut,
        Fut: Future,
    {
        debug!(param = self.param, "Explicit value passed");
        (self.task)(value, args).await
    }
}

impl<D: Clone, F: Clone> Clone for AsyncInjected<D, F> {
    fn clone(&self) -> Self {
        Self {
            dependency: self.dependency.clone(),
            param: self.param,
            task: self.task.clone(),
        }
    }
}

/// Async consumer function running inside a scope of a contextual dependency
pub struct AsyncEnsured<T, E, F> {
    dependency: AsyncContextualDependency<T, E>,
    task: F,
}

impl<T, E, F> AsyncEnsured<T, E, F> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(dependency: AsyncContextualDependency<T, E>, task: F) -> Self {
        Self { dependency, task }
    }

    #[inline]
    #[must_use]
    pub const fn dependency(&self) -> &AsyncContextualDependency<T, E> {
        &self.dependency
    }
}

impl<T, E, F> AsyncEnsured<T, E, F>
where
    T: Send + Sync + 'static,
    E: From<ResolveErrorKind> + Send + 'static,
{
    /// Opens or reuses the scope, awaits the task and closes the scope.
    /// The scope is released even if the returned future is dropped early.
    ///
    /// # Errors
    /// - The error of the acquisition, the task isn't called in this case.
    /// - [`ResolveErrorKind::DependencyLeak`] if the task result holds the resource.
    pub async fn call<Args, Fut>(&self, args: Args) -> Result<Fut::Output, E>
    where
        F: Fn(Args) -> Fut,
        Fut: Future,
    {
        self.dependency.scope(async { (self.task)(args).await }).await
    }
}

impl<T, E, F: Clone> Clone for AsyncEnsured<T, E, F> {
    fn clone(&self) -> Self {
        Self {
            dependency: self.dependency.clone(),
            task: self.task.clone(),
        }
    }
}
