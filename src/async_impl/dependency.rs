use core::{
    fmt::{self, Debug, Formatter},
    future::Future,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, debug_span, Instrument as _};

use super::{
    inject::AsyncInjected,
    instantiator::{boxed_instantiator, BoxedInstantiator, Instantiator},
    overrides::{boxed_factory, resolve_override, AsyncFactoryFn, AsyncFaker},
};
use crate::{
    any::{DependencyId, DependencyInfo},
    config::Config,
    dependency::Kind,
    errors::InstantiateErrorKind,
    overrides::FakeValue,
};

struct DependencyInner<T, E> {
    info: DependencyInfo,
    config: Config,
    instantiator: BoxedInstantiator<T, E>,
    cache: OnceCell<T>,
}

/// Handle around a zero-argument async factory.
///
/// Cached dependencies run the factory once even if the first resolutions are concurrent,
/// the other callers wait for its result.
pub struct AsyncDependency<T, E = InstantiateErrorKind> {
    inner: Arc<DependencyInner<T, E>>,
}

impl<T, E> AsyncDependency<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    #[inline]
    #[must_use]
    pub fn new(instantiator: impl Instantiator<Provides = T, Error = E>) -> Self {
        Self::with_config(instantiator, Config::default())
    }

    #[inline]
    #[must_use]
    pub fn cached(instantiator: impl Instantiator<Provides = T, Error = E>) -> Self {
        Self::with_config(instantiator, Config::cached())
    }

    #[must_use]
    pub fn with_config(instantiator: impl Instantiator<Provides = T, Error = E>, config: Config) -> Self {
        Self {
            inner: Arc::new(DependencyInner {
                info: DependencyInfo::of::<T>(),
                config,
                instantiator: boxed_instantiator(instantiator),
                cache: OnceCell::new(),
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
    pub fn config(&self) -> Config {
        self.inner.config
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> Kind {
        match Kind::of(self.inner.config) {
            Kind::Cached => Kind::AsyncCached,
            _ => Kind::AsyncTransient,
        }
    }

    /// Resolves the value in the current execution context
    ///
    /// # Errors
    /// Returns the error of the factory unchanged
    pub async fn resolve(&self) -> Result<T, E> {
        let span = debug_span!("resolve", dependency = %self.inner.info);

        async {
            if let Some(value) = resolve_override::<T>(self.inner.info.id).await {
                return Ok(value);
            }
            self.provide().await
        }
        .instrument(span)
        .await
    }

    async fn provide(&self) -> Result<T, E> {
        if !self.inner.config.cache_provides {
            let value = (self.inner.instantiator)().await?;
            debug!("Instantiated");
            return Ok(value);
        }

        let value = self
            .inner
            .cache
            .get_or_try_init(|| (self.inner.instantiator)())
            .await?
            .clone();
        debug!("Cached");
        Ok(value)
    }

    #[inline]
    #[must_use]
    pub fn inject<F>(&self, param: &'static str, task: F) -> AsyncInjected<Self, F> {
        AsyncInjected::new(self.clone(), param, task)
    }

    #[inline]
    pub fn fake_value(&self, value: T) -> FakeValue<T> {
        FakeValue::push::<AsyncFactoryFn<T>>(self.inner.info, value)
    }

    /// Creates a reusable override awaiting `factory` on every resolution
    #[inline]
    #[must_use]
    pub fn faker<F, Fut>(&self, factory: F) -> AsyncFaker<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        AsyncFaker::new(self.inner.info, boxed_factory(factory))
    }
}

impl<T, E> Clone for AsyncDependency<T, E> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> PartialEq for AsyncDependency<T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.info == other.inner.info
    }
}

impl<T, E> Eq for AsyncDependency<T, E> {}

impl<T, E> Debug for AsyncDependency<T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncDependency")
            .field("info", &self.inner.info)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
