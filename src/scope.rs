use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    any::{DependencyInfo, RcAny},
    config::ScopeConfig,
    context::{ContextId, ExecutionContext},
    errors::{ResolveErrorKind, StackCorruption},
    finalizer::BoxedFinalizer,
    leak,
};

/// One active scope of a contextual dependency in one context
pub(crate) struct ScopeHandle {
    id: u64,
    owner: ContextId,
    dependency: DependencyInfo,
    resource: Mutex<Option<RcAny>>,
    depth: AtomicUsize,
}

impl ScopeHandle {
    #[must_use]
    fn new(owner: ContextId, dependency: DependencyInfo, resource: RcAny) -> Arc<Self> {
        static NEXT: AtomicU64 = AtomicU64::new(1);

        Arc::new(Self {
            id: NEXT.fetch_add(1, Ordering::Relaxed),
            owner,
            dependency,
            resource: Mutex::new(Some(resource)),
            depth: AtomicUsize::new(1),
        })
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn dependency(&self) -> DependencyInfo {
        self.dependency
    }

    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// `None` once the handle is retired
    #[inline]
    pub(crate) fn resource(&self) -> Option<RcAny> {
        self.resource.lock().clone()
    }

    #[inline]
    fn retire(&self) -> Option<RcAny> {
        self.resource.lock().take()
    }
}

/// Increments the nesting depth of the active scope if the context owns one.
/// Scopes inherited from a parent context are never reused, they get shadowed.
#[must_use]
pub(crate) fn reuse(context: &ExecutionContext, dependency: &DependencyInfo) -> Option<Arc<ScopeHandle>> {
    let handle = context.top_scope(dependency.id)?;
    if handle.owner != context.id() || handle.resource.lock().is_none() {
        return None;
    }

    handle.depth.fetch_add(1, Ordering::SeqCst);
    debug!(depth = handle.depth(), "Reused scope");
    Some(handle)
}

#[must_use]
pub(crate) fn publish(context: &ExecutionContext, dependency: DependencyInfo, resource: RcAny) -> Arc<ScopeHandle> {
    let handle = ScopeHandle::new(context.id(), dependency, resource);
    context.push_scope(dependency.id, handle.clone());
    debug!(handle = handle.id, "Acquired");
    handle
}

pub(crate) struct Released {
    pub(crate) resource: Option<RcAny>,
    pub(crate) corruption: Option<StackCorruption>,
}

/// Decrements the nesting depth. On the outermost exit the handle is popped and retired,
/// and its resource is handed back for release.
#[must_use]
pub(crate) fn leave(context: &ExecutionContext, handle: &ScopeHandle) -> Option<Released> {
    let remaining = handle.depth.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining > 0 {
        debug!(depth = remaining, "Left nested scope");
        return None;
    }

    let corruption = context.pop_scope(&handle.dependency, handle.id).err();
    let resource = handle.retire();
    debug!(handle = handle.id, "Retired");

    Some(Released { resource, corruption })
}

#[inline]
pub(crate) fn report(corruption: Option<StackCorruption>) {
    if let Some(err) = corruption {
        err.raise();
    }
}

#[must_use]
pub(crate) fn downcast<T: Send + Sync + 'static>(resource: RcAny) -> Arc<T> {
    resource.downcast::<T>().expect("Scoped resource type should match its dependency")
}

/// Resolves the resource of the innermost scope of the dependency in the context
pub(crate) fn resolve_scoped<T: Send + Sync + 'static>(
    context: &ExecutionContext,
    dependency: &DependencyInfo,
) -> Result<Arc<T>, ResolveErrorKind> {
    let Some(handle) = context.top_scope(dependency.id) else {
        return Err(ResolveErrorKind::MissingContext {
            dependency: *dependency,
            context: context.id(),
        });
    };

    let resource = leak::live_resource(&handle)?;
    debug!(handle = handle.id, "Resolved from scope");
    Ok(downcast(resource))
}

/// Keeps a scope of a contextual dependency open.
///
/// The outermost guard of a context releases the resource on [`ScopeGuard::exit`] or on drop,
/// so the release also happens if the scoped code panics.
#[must_use = "the scope is closed as soon as the guard is dropped"]
pub struct ScopeGuard<T: Send + Sync + 'static> {
    context: Arc<ExecutionContext>,
    handle: Arc<ScopeHandle>,
    finalizer: Option<BoxedFinalizer<T>>,
    config: ScopeConfig,
    exited: bool,
}

impl<T: Send + Sync + 'static> ScopeGuard<T> {
    #[inline]
    pub(crate) fn new(
        context: Arc<ExecutionContext>,
        handle: Arc<ScopeHandle>,
        finalizer: Option<BoxedFinalizer<T>>,
        config: ScopeConfig,
    ) -> Self {
        Self {
            context,
            handle,
            finalizer,
            config,
            exited: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.context.id()
    }

    /// Count of nested guards sharing the resource, this one included
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.handle.depth()
    }

    /// Closes the scope
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::DependencyLeak`] if references to the resource outlived the outermost scope.
    /// The resource is released before the error is returned.
    ///
    /// # Panics
    /// Panics if the scope isn't the innermost one of its dependency in the context
    pub fn exit(mut self) -> Result<(), ResolveErrorKind> {
        self.exited = true;
        self.release()
    }

    fn release(&self) -> Result<(), ResolveErrorKind> {
        let Some(Released { resource, corruption }) = leave(&self.context, &self.handle) else {
            return Ok(());
        };

        let result = match resource {
            Some(resource) => {
                let resource = downcast::<T>(resource);
                let outstanding = leak::outstanding(&resource);
                match &self.finalizer {
                    Some(finalizer) => {
                        finalizer.finalize(resource);
                        debug!("Finalizer called");
                    }
                    None => drop(resource),
                }
                debug!("Released");
                leak::check_released(self.handle.dependency(), outstanding, self.config)
            }
            None => Ok(()),
        };

        report(corruption);
        result
    }
}

impl<T: Send + Sync + 'static> Drop for ScopeGuard<T> {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;

        if let Err(err) = self.release() {
            warn!(%err, "Scope closed on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{leave, publish, resolve_scoped, reuse};
    use crate::{
        any::DependencyInfo,
        context::ExecutionContext,
        errors::{LeakKind, ResolveErrorKind},
    };

    use std::sync::Arc;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_state_machine() {
        let dependency = DependencyInfo::of::<&str>();
        let context = ExecutionContext::isolated();

        assert!(matches!(
            resolve_scoped::<&str>(&context, &dependency),
            Err(ResolveErrorKind::MissingContext { .. })
        ));
        assert!(reuse(&context, &dependency).is_none());

        let handle = publish(&context, dependency, Arc::new("conn"));
        assert_eq!(*resolve_scoped::<&str>(&context, &dependency).unwrap(), "conn");

        let nested = reuse(&context, &dependency).unwrap();
        assert!(Arc::ptr_eq(&handle, &nested));
        assert_eq!(handle.depth(), 2);

        assert!(leave(&context, &nested).is_none());
        assert_eq!(context.scope_depth(dependency.id), 1);

        let released = leave(&context, &handle).unwrap();
        assert!(released.corruption.is_none());
        assert_eq!(*released.resource.unwrap().downcast::<&str>().unwrap(), "conn");
        assert_eq!(context.scope_depth(dependency.id), 0);
        assert!(context.is_empty());
    }

    #[test]
    #[traced_test]
    fn test_inherited_scope_is_shadowed_not_reused() {
        let dependency = DependencyInfo::of::<&str>();
        let parent = ExecutionContext::isolated();
        let parent_handle = publish(&parent, dependency, Arc::new("parent"));

        let child = parent.fork();
        assert_eq!(*resolve_scoped::<&str>(&child, &dependency).unwrap(), "parent");
        assert!(reuse(&child, &dependency).is_none());

        let child_handle = publish(&child, dependency, Arc::new("child"));
        assert_eq!(*resolve_scoped::<&str>(&child, &dependency).unwrap(), "child");

        let _ = leave(&child, &child_handle).unwrap();
        assert_eq!(*resolve_scoped::<&str>(&child, &dependency).unwrap(), "parent");

        let _ = leave(&parent, &parent_handle).unwrap();
        assert_eq!(
            resolve_scoped::<&str>(&child, &dependency).unwrap_err(),
            ResolveErrorKind::DependencyLeak {
                dependency,
                kind: LeakKind::Retired,
            }
        );
    }
}
