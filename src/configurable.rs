use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, debug_span};

use crate::{
    any::{DependencyId, DependencyInfo},
    context::ExecutionContext,
    dependency::Kind,
    errors::InstantiateErrorKind,
    inject::Injected,
    overrides::{top_entry, FakeValue, Faker, OverrideEntry},
};

/// Fake factory of a configurable dependency, it receives the config of the resolution
pub type ConfiguredFactory<C, V> = Arc<dyn Fn(&C) -> V + Send + Sync>;

type BoxedConfiguredInstantiator<C, T, E> = Arc<dyn Fn(C) -> Result<T, E> + Send + Sync>;

struct ConfigurableInner<C, T, E> {
    info: DependencyInfo,
    instantiator: BoxedConfiguredInstantiator<C, T, E>,
}

/// Transient dependency whose factory takes a config.
///
/// The config is fixed per injection point with [`ConfigurableDependency::bind`] or
/// [`ConfigurableDependency::inject`], so different consumers can get differently configured values.
pub struct ConfigurableDependency<C, T, E = InstantiateErrorKind> {
    inner: Arc<ConfigurableInner<C, T, E>>,
}

impl<C, T, E> ConfigurableDependency<C, T, E>
where
    C: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    #[inline]
    #[must_use]
    pub fn new(instantiator: impl Fn(C) -> Result<T, E> + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ConfigurableInner {
                info: DependencyInfo::of::<T>(),
                instantiator: Arc::new(instantiator),
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
        Kind::Transient
    }

    /// Resolves the value for `config` in the current execution context
    ///
    /// # Errors
    /// Returns the error of the factory unchanged
    pub fn resolve(&self, config: C) -> Result<T, E> {
        let span = debug_span!("resolve", dependency = %self.inner.info);
        let _guard = span.enter();

        let context = ExecutionContext::current();
        if let Some(entry) = top_entry::<T, ConfiguredFactory<C, T>>(&context, self.inner.info.id) {
            let value = match &*entry {
                OverrideEntry::Value(value) => value.clone(),
                OverrideEntry::Factory(factory) => factory(&config),
            };
            debug!("Resolved from override");
            return Ok(value);
        }

        let value = (self.inner.instantiator)(config)?;
        debug!("Instantiated");
        Ok(value)
    }

    /// Fixes the config, the result can be used everywhere a dependency is expected
    #[inline]
    #[must_use]
    pub fn bind(&self, config: C) -> BoundDependency<C, T, E> {
        BoundDependency {
            dependency: self.clone(),
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn inject<F>(&self, param: &'static str, config: C, task: F) -> Injected<BoundDependency<C, T, E>, F> {
        Injected::new(self.bind(config), param, task)
    }

    /// Overrides the dependency with `value` for every config while the guard lives
    #[inline]
    pub fn fake_value(&self, value: T) -> FakeValue<T> {
        FakeValue::push::<ConfiguredFactory<C, T>>(self.inner.info, value)
    }

    #[inline]
    #[must_use]
    pub fn faker(&self, factory: impl Fn(&C) -> T + Send + Sync + 'static) -> Faker<T, ConfiguredFactory<C, T>> {
        Faker::new(self.inner.info, Arc::new(factory) as ConfiguredFactory<C, T>)
    }
}

impl<C, T, E> Clone for ConfigurableDependency<C, T, E> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<C, T, E> PartialEq for ConfigurableDependency<C, T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.info == other.inner.info
    }
}

impl<C, T, E> Eq for ConfigurableDependency<C, T, E> {}

impl<C, T, E> Debug for ConfigurableDependency<C, T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurableDependency")
            .field("info", &self.inner.info)
            .finish_non_exhaustive()
    }
}

/// Configurable dependency with its config fixed
pub struct BoundDependency<C, T, E = InstantiateErrorKind> {
    dependency: ConfigurableDependency<C, T, E>,
    config: C,
}

impl<C, T, E> BoundDependency<C, T, E>
where
    C: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    /// # Errors
    /// Returns the error of the factory unchanged
    #[inline]
    pub fn resolve(&self) -> Result<T, E> {
        self.dependency.resolve(self.config.clone())
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &C {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn dependency(&self) -> &ConfigurableDependency<C, T, E> {
        &self.dependency
    }
}

impl<C: Clone, T, E> Clone for BoundDependency<C, T, E> {
    fn clone(&self) -> Self {
        Self {
            dependency: self.dependency.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C: Debug, T, E> Debug for BoundDependency<C, T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundDependency")
            .field("info", &self.dependency.inner.info)
            .field("config", &self.config)
            .finish()
    }
}
