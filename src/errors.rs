mod dependency_resolver;
mod instantiate;
mod stack;

pub use dependency_resolver::{LeakKind, ResolveErrorKind};
pub use instantiate::InstantiateErrorKind;
pub use stack::StackCorruption;
