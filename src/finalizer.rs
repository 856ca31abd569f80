use std::sync::Arc;

/// Release procedure of a contextual dependency.
/// Called once with the resource when its outermost scope closes.
pub trait Finalizer<Dep>: Send + Sync + 'static {
    fn finalize(&self, dependency: Arc<Dep>);
}

pub(crate) type BoxedFinalizer<Dep> = Arc<dyn Finalizer<Dep>>;

impl<F, Dep> Finalizer<Dep> for F
where
    F: Fn(Arc<Dep>) + Send + Sync + 'static,
{
    #[inline]
    fn finalize(&self, dependency: Arc<Dep>) {
        self(dependency);
    }
}
