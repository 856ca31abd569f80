use core::fmt::{self, Display, Formatter};

use crate::{any::DependencyInfo, context::ContextId};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveErrorKind {
    #[error(
        "\
        Dependency {dependency} has no active scope in context {context}. \
        Contextual dependencies can only be injected inside `ensure`\
        "
    )]
    MissingContext { dependency: DependencyInfo, context: ContextId },
    #[error("Dependency {dependency} leaked out of its scope: {kind}")]
    DependencyLeak { dependency: DependencyInfo, kind: LeakKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakKind {
    /// References to the resource were still alive when its scope released it
    Escaped { outstanding: usize },
    /// The resource was requested through a scope handle that was already released
    Retired,
}

impl Display for LeakKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LeakKind::Escaped { outstanding } => write!(f, "{outstanding} reference(s) outlived the release"),
            LeakKind::Retired => write!(f, "the resource was already released"),
        }
    }
}
