use core::future::Future;
use std::sync::Arc;

use crate::utils::future::BoxFuture;

/// Async release procedure of a contextual dependency
pub trait Finalizer<Dep>: Send + Sync + 'static {
    fn finalize(&self, dependency: Arc<Dep>) -> impl Future<Output = ()> + Send;
}

impl<F, Fut, Dep> Finalizer<Dep> for F
where
    F: Fn(Arc<Dep>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    #[inline]
    fn finalize(&self, dependency: Arc<Dep>) -> impl Future<Output = ()> + Send {
        self(dependency)
    }
}

pub(crate) type BoxedFinalizer<Dep> = Arc<dyn Fn(Arc<Dep>) -> BoxFuture<'static, ()> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_finalizer<Dep, Fin>(finalizer: Fin) -> BoxedFinalizer<Dep>
where
    Dep: Send + Sync + 'static,
    Fin: Finalizer<Dep>,
{
    let finalizer = Arc::new(finalizer);
    Arc::new(move |dependency: Arc<Dep>| {
        let finalizer = finalizer.clone();
        Box::pin(async move { finalizer.finalize(dependency).await }) as BoxFuture<'static, ()>
    })
}
