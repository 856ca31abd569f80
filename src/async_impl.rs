pub(crate) mod context;
pub(crate) mod contextual;
pub(crate) mod dependency;
pub(crate) mod dependency_resolver;
pub(crate) mod finalizer;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod overrides;

pub use context::{scope, scope_with, spawn};
pub use contextual::{AsyncContextualDependency, AsyncScopeGuard};
pub use dependency::AsyncDependency;
pub use dependency_resolver::AsyncDependencyResolver;
pub use finalizer::Finalizer;
pub use inject::{AsyncEnsured, AsyncInjected};
pub use instantiator::Instantiator;
pub use overrides::{AsyncFactoryFn, AsyncFaker};
