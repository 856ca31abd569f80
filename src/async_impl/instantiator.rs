use core::future::Future;
use std::sync::Arc;

use crate::utils::future::BoxFuture;

/// Zero-argument async factory of a dependency
pub trait Instantiator: Send + Sync + 'static {
    type Provides: 'static;
    type Error;

    fn instantiate(&self) -> impl Future<Output = Result<Self::Provides, Self::Error>> + Send;
}

impl<F, Fut, Response, Err> Instantiator for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Err>> + Send,
    Response: 'static,
{
    type Provides = Response;
    type Error = Err;

    #[inline]
    fn instantiate(&self) -> impl Future<Output = Result<Self::Provides, Self::Error>> + Send {
        self()
    }
}

pub(crate) type BoxedInstantiator<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_instantiator<Inst>(instantiator: Inst) -> BoxedInstantiator<Inst::Provides, Inst::Error>
where
    Inst: Instantiator,
{
    let instantiator = Arc::new(instantiator);
    Arc::new(move || {
        let instantiator = instantiator.clone();
        Box::pin(async move { instantiator.instantiate().await }) as BoxFuture<'static, _>
    })
}
