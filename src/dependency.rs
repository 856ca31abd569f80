use core::fmt::{self, Debug, Formatter};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, debug_span};

use crate::{
    any::{DependencyId, DependencyInfo},
    config::Config,
    context::ExecutionContext,
    errors::InstantiateErrorKind,
    inject::Injected,
    instantiator::{BoxedInstantiator, Instantiator},
    overrides::{resolve_override, FactoryFn, FakeValue, Faker},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Transient,
    Cached,
    Contextual,
    AsyncTransient,
    AsyncCached,
    AsyncContextual,
}

impl Kind {
    #[inline]
    #[must_use]
    pub const fn is_async(self) -> bool {
        matches!(self, Self::AsyncTransient | Self::AsyncCached | Self::AsyncContextual)
    }

    #[inline]
    #[must_use]
    pub const fn is_contextual(self) -> bool {
        matches!(self, Self::Contextual | Self::AsyncContextual)
    }

    #[inline]
    #[must_use]
    pub(crate) const fn of(config: Config) -> Self {
        if config.cache_provides {
            Self::Cached
        } else {
            Self::Transient
        }
    }
}

struct DependencyInner<T, E> {
    info: DependencyInfo,
    config: Config,
    instantiator: BoxedInstantiator<T, E>,
    cache: Mutex<Option<T>>,
}

/// Handle around a zero-argument factory.
///
/// Clones share the identity of the dependency, so overrides pushed through a clone
/// are seen by every other clone. Two dependencies built from the same factory are unrelated.
///
/// # Examples
/// ```rust
/// use diwrap::{Dependency, InstantiateErrorKind};
///
/// let token = Dependency::new(|| Ok::<_, InstantiateErrorKind>("secret"));
/// let headers = token.inject("token", |token: &str, ()| format!("Bearer {token}"));
///
/// assert_eq!(headers.call(()).unwrap(), "Bearer secret");
///
/// let _fake = token.fake_value("fake");
/// assert_eq!(headers.call(()).unwrap(), "Bearer fake");
/// ```
pub struct Dependency<T, E = InstantiateErrorKind> {
    inner: Arc<DependencyInner<T, E>>,
}

impl<T, E> Dependency<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    /// Creates a transient dependency: the factory is called on every resolution
    #[inline]
    #[must_use]
    pub fn new(instantiator: impl Instantiator<Provides = T, Error = E>) -> Self {
        Self::with_config(instantiator, Config::default())
    }

    /// Creates a dependency whose first value is reused for the process lifetime
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
                instantiator: Arc::new(instantiator),
                cache: Mutex::new(None),
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
        Kind::of(self.inner.config)
    }

    /// Resolves the value in the current execution context.
    /// The innermost active override wins over the factory and the cache.
    ///
    /// # Errors
    /// Returns the error of the factory unchanged
    pub fn resolve(&self) -> Result<T, E> {
        let span = debug_span!("resolve", dependency = %self.inner.info);
        let _guard = span.enter();

        if let Some(value) = resolve_override::<T>(&ExecutionContext::current(), self.inner.info.id) {
            return Ok(value);
        }
        self.provide()
    }

    /// Gets the value from the cache or the factory, ignoring overrides
    fn provide(&self) -> Result<T, E> {
        if !self.inner.config.cache_provides {
            let value = self.inner.instantiator.instantiate()?;
            debug!("Instantiated");
            return Ok(value);
        }

        // Held across instantiation so concurrent first calls run the factory once
        let mut cache = self.inner.cache.lock();
        if let Some(value) = &*cache {
            debug!("Found in cache");
            return Ok(value.clone());
        }

        let value = self.inner.instantiator.instantiate()?;
        *cache = Some(value.clone());
        debug!("Cached");
        Ok(value)
    }

    /// Binds the dependency to the `param` of `task`
    #[inline]
    #[must_use]
    pub fn inject<F>(&self, param: &'static str, task: F) -> Injected<Self, F> {
        Injected::new(self.clone(), param, task)
    }

    /// Overrides the dependency with `value` in the current context while the guard lives
    #[inline]
    pub fn fake_value(&self, value: T) -> FakeValue<T> {
        FakeValue::push::<FactoryFn<T>>(self.inner.info, value)
    }

    /// Creates a reusable override calling `factory` on every resolution
    #[inline]
    #[must_use]
    pub fn faker(&self, factory: impl Fn() -> T + Send + Sync + 'static) -> Faker<T> {
        Faker::new(self.inner.info, Arc::new(factory) as FactoryFn<T>)
    }
}

impl<T, E> Clone for Dependency<T, E> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> PartialEq for Dependency<T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.info == other.inner.info
    }
}

impl<T, E> Eq for Dependency<T, E> {}

impl<T, E> Debug for Dependency<T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("info", &self.inner.info)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Dependency, Kind};
    use crate::{config::Config, context::spawn, errors::InstantiateErrorKind, instance, InheritPolicy};

    use core::sync::atomic::{AtomicU8, Ordering};
    use std::{sync::Arc, thread, time::Duration};
    use tracing::debug;
    use tracing_test::traced_test;

    struct Client {
        token: &'static str,
    }

    fn seven() -> Dependency<u32> {
        Dependency::new(|| Ok::<_, InstantiateErrorKind>(7))
    }

    #[test]
    #[traced_test]
    fn test_inject_and_fake_value() {
        let dependency = seven();
        let double = dependency.inject("x", |x: u32, ()| x * 2);

        assert_eq!(double.call(()).unwrap(), 14);
        {
            let fake = dependency.fake_value(42);
            assert_eq!(*fake, 42);
            assert_eq!(double.call(()).unwrap(), 84);
        }
        assert_eq!(double.call(()).unwrap(), 14);
    }

    #[test]
    #[traced_test]
    fn test_transient() {
        let call_count = Arc::new(AtomicU8::new(0));
        let dependency = Dependency::new({
            let call_count = call_count.clone();
            move || {
                call_count.fetch_add(1, Ordering::SeqCst);

                debug!("Call instantiator");
                Ok::<_, InstantiateErrorKind>(Arc::new(()))
            }
        });
        assert_eq!(dependency.kind(), Kind::Transient);

        let first = dependency.resolve().unwrap();
        let second = dependency.resolve().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_cached() {
        let call_count = Arc::new(AtomicU8::new(0));
        let dependency = Dependency::cached({
            let call_count = call_count.clone();
            move || {
                call_count.fetch_add(1, Ordering::SeqCst);

                debug!("Call instantiator");
                Ok::<_, InstantiateErrorKind>(Arc::new(()))
            }
        });
        assert_eq!(dependency.kind(), Kind::Cached);

        let first = dependency.resolve().unwrap();
        let second = dependency.clone().resolve().unwrap();
        let third = spawn(InheritPolicy::Isolated, {
            let dependency = dependency.clone();
            move || dependency.resolve().unwrap()
        })
        .join()
        .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_cached_concurrent_first_resolutions() {
        let call_count = Arc::new(AtomicU8::new(0));
        let dependency = Dependency::cached({
            let call_count = call_count.clone();
            move || {
                call_count.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                Ok::<_, InstantiateErrorKind>(Arc::new(()))
            }
        });

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dependency = dependency.clone();
                thread::spawn(move || dependency.resolve().unwrap())
            })
            .collect();
        let values: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|value| Arc::ptr_eq(value, &values[0])));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(!Kind::Transient.is_async());
        assert!(!Kind::Cached.is_contextual());
        assert!(Kind::Contextual.is_contextual());
        assert!(!Kind::Contextual.is_async());
        assert!(Kind::AsyncTransient.is_async());
        assert!(!Kind::AsyncCached.is_contextual());
        assert!(Kind::AsyncContextual.is_async());
        assert!(Kind::AsyncContextual.is_contextual());

        assert!(!seven().kind().is_async());
        assert!(!seven().kind().is_contextual());
    }

    #[test]
    #[traced_test]
    fn test_override_wins_over_cache() {
        let dependency = Dependency::with_config(instance(1u8), Config { cache_provides: true });
        assert_eq!(dependency.resolve().unwrap(), 1);

        let fake = dependency.fake_value(2);
        assert_eq!(dependency.resolve().unwrap(), 2);
        assert_eq!(fake.release(), 2);

        assert_eq!(dependency.resolve().unwrap(), 1);
    }

    #[test]
    #[traced_test]
    fn test_faker() {
        let dependency = seven();
        let call_count = Arc::new(AtomicU8::new(0));
        let faker = dependency.faker({
            let call_count = call_count.clone();
            move || u32::from(call_count.fetch_add(1, Ordering::SeqCst))
        });

        faker.run(|| {
            assert_eq!(dependency.resolve().unwrap(), 0);
            assert_eq!(dependency.resolve().unwrap(), 1);
        });
        assert_eq!(dependency.resolve().unwrap(), 7);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_identity_is_per_dependency() {
        let first = seven();
        let second = seven();
        assert_ne!(first, second);
        assert_eq!(first, first.clone());

        let _fake = first.fake_value(1);
        assert_eq!(first.resolve().unwrap(), 1);
        assert_eq!(second.resolve().unwrap(), 7);
    }

    #[test]
    #[traced_test]
    fn test_factory_error_is_unchanged() {
        #[derive(Debug, PartialEq)]
        struct Unavailable(&'static str);

        let dependency: Dependency<u8, Unavailable> = Dependency::new(|| Err::<u8, _>(Unavailable("db is down")));

        assert_eq!(dependency.resolve().unwrap_err(), Unavailable("db is down"));
        assert_eq!(
            dependency.inject("db", |db: u8, ()| db).call(()).unwrap_err(),
            Unavailable("db is down")
        );
    }

    #[test]
    #[traced_test]
    fn test_chained_dependency_sees_inner_override() {
        let token = Dependency::new(|| Ok::<_, InstantiateErrorKind>("real"));
        let client = Dependency::new({
            let token = token.clone();
            move || token.resolve().map(|token| Arc::new(Client { token }))
        });

        assert_eq!(client.resolve().unwrap().token, "real");

        let _fake = token.fake_value("fake");
        assert_eq!(client.resolve().unwrap().token, "fake");
    }

    #[test]
    #[traced_test]
    fn test_explicit_value_wins() {
        let call_count = Arc::new(AtomicU8::new(0));
        let dependency = Dependency::new({
            let call_count = call_count.clone();
            move || Ok::<_, InstantiateErrorKind>(call_count.fetch_add(1, Ordering::SeqCst))
        });
        let add = dependency.inject("base", |base: u8, extra: u8| base + extra);

        assert_eq!(add.call_with(10, 5), 15);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(add.call(5).unwrap(), 5);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
