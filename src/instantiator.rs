use std::sync::Arc;

use crate::errors::InstantiateErrorKind;

/// Zero-argument factory of a dependency
pub trait Instantiator: Send + Sync + 'static {
    type Provides: 'static;
    type Error;

    fn instantiate(&self) -> Result<Self::Provides, Self::Error>;
}

impl<F, Response, Err> Instantiator for F
where
    F: Fn() -> Result<Response, Err> + Send + Sync + 'static,
    Response: 'static,
{
    type Provides = Response;
    type Error = Err;

    #[inline]
    fn instantiate(&self) -> Result<Self::Provides, Self::Error> {
        self()
    }
}

pub(crate) type BoxedInstantiator<T, E> = Arc<dyn Instantiator<Provides = T, Error = E>>;

/// Wrapper to create an instantiator that just returns passed value.
/// It can be used when the value was created outside the dependency.
#[inline]
#[must_use]
pub const fn instance<T>(val: T) -> impl Instantiator<Provides = T, Error = InstantiateErrorKind>
where
    T: Clone + Send + Sync + 'static,
{
    move || Ok::<_, InstantiateErrorKind>(val.clone())
}
