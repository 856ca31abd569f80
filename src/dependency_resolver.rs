use std::sync::Arc;

use crate::{
    configurable::BoundDependency,
    contextual::ContextualDependency,
    dependency::Dependency,
    errors::{InstantiateErrorKind, ResolveErrorKind},
    inject::Injected,
};

/// Anything that can supply a value to an injected function.
///
/// Implemented for every dependency type and for tuples of up to 12 resolvers,
/// so one function can receive several dependencies.
pub trait DependencyResolver: Clone + Send + Sync + 'static {
    type Provides;
    type Error;

    fn resolve(&self) -> Result<Self::Provides, Self::Error>;

    #[inline]
    #[must_use]
    fn inject<F>(&self, param: &'static str, task: F) -> Injected<Self, F> {
        Injected::new(self.clone(), param, task)
    }
}

impl<T, E> DependencyResolver for Dependency<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    type Provides = T;
    type Error = E;

    #[inline]
    fn resolve(&self) -> Result<Self::Provides, Self::Error> {
        Dependency::resolve(self)
    }
}

impl<T, E> DependencyResolver for ContextualDependency<T, E>
where
    T: Send + Sync + 'static,
    E: From<ResolveErrorKind> + 'static,
{
    type Provides = Arc<T>;
    type Error = E;

    #[inline]
    fn resolve(&self) -> Result<Self::Provides, Self::Error> {
        ContextualDependency::resolve(self)
    }
}

impl<C, T, E> DependencyResolver for BoundDependency<C, T, E>
where
    C: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    type Provides = T;
    type Error = E;

    #[inline]
    fn resolve(&self) -> Result<Self::Provides, Self::Error> {
        BoundDependency::resolve(self)
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, $ty::Error: Into<InstantiateErrorKind>, )*
        {
            type Provides = ($($ty::Provides,)*);
            type Error = InstantiateErrorKind;

            #[inline]
            fn resolve(&self) -> Result<Self::Provides, Self::Error> {
                let ($($ty,)*) = self;
                Ok(($($ty.resolve().map_err(Into::into)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
