//! Identity based detection of resources used outside of their scope.
//!
//! Detection is advisory: only references counted by the resource's `Arc` are visible,
//! anything copied out of the resource by value escapes unnoticed.

use std::sync::Arc;

use crate::{
    any::{DependencyInfo, RcAny},
    config::ScopeConfig,
    errors::{LeakKind, ResolveErrorKind},
    scope::ScopeHandle,
};

/// Resource of a handle that wasn't released yet
pub(crate) fn live_resource(handle: &ScopeHandle) -> Result<RcAny, ResolveErrorKind> {
    handle.resource().ok_or(ResolveErrorKind::DependencyLeak {
        dependency: handle.dependency(),
        kind: LeakKind::Retired,
    })
}

/// References to the resource besides the one being released
#[inline]
#[must_use]
pub(crate) fn outstanding<T: ?Sized>(resource: &Arc<T>) -> usize {
    Arc::strong_count(resource) - 1
}

pub(crate) fn check_released(dependency: DependencyInfo, outstanding: usize, config: ScopeConfig) -> Result<(), ResolveErrorKind> {
    if outstanding == 0 || !config.detect_leaks {
        return Ok(());
    }

    Err(ResolveErrorKind::DependencyLeak {
        dependency,
        kind: LeakKind::Escaped { outstanding },
    })
}
