use core::future::Future;
use std::sync::Arc;

use super::{contextual::AsyncContextualDependency, dependency::AsyncDependency, inject::AsyncInjected};
use crate::{
    configurable::BoundDependency,
    contextual::ContextualDependency,
    dependency::Dependency,
    errors::{InstantiateErrorKind, ResolveErrorKind},
};

/// Anything that can supply a value to an async injected function.
///
/// Sync dependencies implement it as well, so they can be mixed with async ones in tuples.
pub trait AsyncDependencyResolver: Clone + Send + Sync + 'static {
    type Provides: Send;
    type Error: Send;

    fn resolve_async(&self) -> impl Future<Output = Result<Self::Provides, Self::Error>> + Send;

    #[inline]
    #[must_use]
    fn inject_async<F>(&self, param: &'static str, task: F) -> AsyncInjected<Self, F> {
        AsyncInjected::new(self.clone(), param, task)
    }
}

impl<T, E> AsyncDependencyResolver for AsyncDependency<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    type Provides = T;
    type Error = E;

    #[inline]
    async fn resolve_async(&self) -> Result<Self::Provides, Self::Error> {
        self.resolve().await
    }
}

impl<T, E> AsyncDependencyResolver for AsyncContextualDependency<T, E>
where
    T: Send + Sync + 'static,
    E: From<ResolveErrorKind> + Send + 'static,
{
    type Provides = Arc<T>;
    type Error = E;

    #[inline]
    async fn resolve_async(&self) -> Result<Self::Provides, Self::Error> {
        self.resolve().await
    }
}

impl<T, E> AsyncDependencyResolver for Dependency<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    type Provides = T;
    type Error = E;

    #[inline]
    async fn resolve_async(&self) -> Result<Self::Provides, Self::Error> {
        self.resolve()
    }
}

impl<T, E> AsyncDependencyResolver for ContextualDependency<T, E>
where
    T: Send + Sync + 'static,
    E: From<ResolveErrorKind> + Send + 'static,
{
    type Provides = Arc<T>;
    type Error = E;

    #[inline]
    async fn resolve_async(&self) -> Result<Self::Provides, Self::Error> {
        self.resolve()
    }
}

impl<C, T, E> AsyncDependencyResolver for BoundDependency<C, T, E>
where
    C: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    type Provides = T;
    type Error = E;

    #[inline]
    async fn resolve_async(&self) -> Result<Self::Provides, Self::Error> {
        self.resolve()
    }
}

macro_rules! impl_async_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<$($ty,)*> AsyncDependencyResolver for ($($ty,)*)
        where
            $( $ty: AsyncDependencyResolver, $ty::Error: Into<InstantiateErrorKind>, )*
        {
            type Provides = ($($ty::Provides,)*);
            type Error = InstantiateErrorKind;

            #[inline]
            async fn resolve_async(&self) -> Result<Self::Provides, Self::Error> {
                let ($($ty,)*) = self;
                Ok(($($ty.resolve_async().await.map_err(Into::into)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_async_dependency_resolver);
