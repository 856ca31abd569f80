#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod config;
pub(crate) mod configurable;
pub(crate) mod context;
pub(crate) mod contextual;
pub(crate) mod dependency;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod leak;
pub(crate) mod overrides;
pub(crate) mod scope;

#[cfg(feature = "async")]
pub(crate) mod utils;

#[cfg(feature = "async")]
pub mod async_impl;

pub use any::{DependencyId, DependencyInfo};
pub use config::{Config, InheritPolicy, ScopeConfig};
pub use configurable::{BoundDependency, ConfigurableDependency, ConfiguredFactory};
pub use context::{spawn, ContextId, ExecutionContext};
pub use contextual::ContextualDependency;
pub use dependency::{Dependency, Kind};
pub use dependency_resolver::DependencyResolver;
pub use errors::{InstantiateErrorKind, LeakKind, ResolveErrorKind, StackCorruption};
pub use finalizer::Finalizer;
pub use inject::{Ensured, Injected};
pub use instantiator::{instance, Instantiator};
pub use overrides::{FakeValue, Faker, OverrideGuard};
pub use scope::ScopeGuard;
