use tracing::{debug, debug_span};

use crate::{contextual::ContextualDependency, dependency_resolver::DependencyResolver};

/// Consumer function with one parameter bound to a dependency.
///
/// The binding is fixed at wrap time, the value is resolved in the caller's execution context
/// on every [`Injected::call`]. The remaining arguments are passed as `args`, use a tuple for several.
pub struct Injected<D, F> {
    dependency: D,
    param: &'static str,
    task: F,
}

impl<D, F> Injected<D, F> {
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

impl<D, F> Injected<D, F>
where
    D: DependencyResolver,
{
    /// Resolves the dependency and calls the task with it
    ///
    /// # Errors
    /// Returns the resolution error, the task isn't called in this case
    pub fn call<Args, R>(&self, args: Args) -> Result<R, D::Error>
    where
        F: Fn(D::Provides, Args) -> R,
    {
        let span = debug_span!("inject", param = self.param);
        let _guard = span.enter();

        let value = self.dependency.resolve()?;
        Ok((self.task)(value, args))
    }

    /// Calls the task with an explicitly passed value, nothing is resolved
    pub fn call_with<Args, R>(&self, value: D::Provides, args: Args) -> R
    where
        F: Fn(D::Provides, Args) -> R,
    {
        debug!(param = self.param, "Explicit value passed");
        (self.task)(value, args)
    }
}

impl<D: Clone, F: Clone> Clone for Injected<D, F> {
    fn clone(&self) -> Self {
        Self {
            dependency: self.dependency.clone(),
            param: self.param,
            task: self.task.clone(),
        }
    }
}

/// Consumer function running inside a scope of a contextual dependency
pub struct Ensured<T, E, F> {
    dependency: ContextualDependency<T, E>,
    task: F,
}

impl<T, E, F> Ensured<T, E, F> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(dependency: ContextualDependency<T, E>, task: F) -> Self {
        Self { dependency, task }
    }

    #[inline]
    #[must_use]
    pub const fn dependency(&self) -> &ContextualDependency<T, E> {
        &self.dependency
    }
}

impl<T, E, F> Ensured<T, E, F>
where
    T: Send + Sync + 'static,
    E: From<crate::errors::ResolveErrorKind> + 'static,
{
    /// Opens or reuses the scope, calls the task and closes the scope
    ///
    /// # Errors
    /// - The error of the acquisition, the task isn't called in this case.
    /// - [`crate::ResolveErrorKind::DependencyLeak`] if the task result holds the resource,
    ///   the result is dropped in this case.
    pub fn call<Args, R>(&self, args: Args) -> Result<R, E>
    where
        F: Fn(Args) -> R,
    {
        self.dependency.scope(|| (self.task)(args))
    }
}

impl<T, E, F: Clone> Clone for Ensured<T, E, F> {
    fn clone(&self) -> Self {
        Self {
            dependency: self.dependency.clone(),
            task: self.task.clone(),
        }
    }
}
