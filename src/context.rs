use core::{
    fmt::{self, Display, Formatter},
    sync::atomic::{AtomicU64, Ordering},
};
use parking_lot::Mutex;
use std::{cell::RefCell, collections::HashMap, sync::Arc, thread};
use tracing::debug;

use crate::{
    any::{DependencyId, DependencyInfo, RcAny},
    config::InheritPolicy,
    errors::StackCorruption,
    scope::ScopeHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

impl ContextId {
    #[inline]
    #[must_use]
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

#[derive(Clone)]
pub(crate) struct OverrideRecord {
    pub(crate) entry_id: u64,
    pub(crate) entry: RcAny,
}

/// Overrides and scopes of one dependency in one context
#[derive(Clone, Default)]
pub(crate) struct Slot {
    pub(crate) overrides: Vec<OverrideRecord>,
    pub(crate) scopes: Vec<Arc<ScopeHandle>>,
}

impl Slot {
    #[inline]
    fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.scopes.is_empty()
    }
}

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<Arc<ExecutionContext>>> = const { RefCell::new(None) };
}

/// Unit of isolation for overrides and scopes.
///
/// Every thread gets its own context on first use, and so does every tokio task.
/// Tasks running inside [`crate::async_impl::scope`] or spawned with [`crate::async_impl::spawn`]
/// use the context given to them. Other tasks get an isolated context of their own,
/// never the context of the thread polling them.
pub struct ExecutionContext {
    id: ContextId,
    parent: Option<ContextId>,
    slots: Mutex<HashMap<DependencyId, Slot>>,
}

impl ExecutionContext {
    #[inline]
    #[must_use]
    fn with_slots(parent: Option<ContextId>, slots: HashMap<DependencyId, Slot>) -> Arc<Self> {
        let context = Self {
            id: ContextId::next(),
            parent,
            slots: Mutex::new(slots),
        };
        debug!(context = %context.id, parent = ?parent.map(|id| id.to_string()), "Context created");
        Arc::new(context)
    }

    /// Creates a context without overrides and scopes
    #[inline]
    #[must_use]
    pub fn isolated() -> Arc<Self> {
        Self::with_slots(None, HashMap::new())
    }

    /// Creates a child context with a snapshot of this context's overrides and scopes.
    ///
    /// # Notes
    /// Inherited scopes are readable in the child but stay owned by this context.
    /// Once this context releases them, resolving them in the child fails with
    /// [`crate::ResolveErrorKind::DependencyLeak`].
    #[must_use]
    pub fn fork(&self) -> Arc<Self> {
        let slots = self.slots.lock().clone();
        Self::with_slots(Some(self.id), slots)
    }

    #[inline]
    #[must_use]
    pub fn branch(&self, policy: InheritPolicy) -> Arc<Self> {
        match policy {
            InheritPolicy::Isolated => Self::with_slots(Some(self.id), HashMap::new()),
            InheritPolicy::Snapshot => self.fork(),
        }
    }

    /// Returns the context of the running task, or the context of the current thread
    /// when called outside of a tokio task
    #[must_use]
    pub fn current() -> Arc<Self> {
        #[cfg(feature = "async")]
        if let Some(context) = crate::async_impl::context::task_context() {
            return context;
        }

        THREAD_CONTEXT.with(|cell| cell.borrow_mut().get_or_insert_with(Self::isolated).clone())
    }

    /// Runs `f` with this context installed as the context of the current thread.
    /// The previous context is restored afterwards, even if `f` panics.
    ///
    /// Inside a tokio task the context of the task takes precedence,
    /// use [`crate::async_impl::scope_with`] there.
    pub fn run<R>(self: &Arc<Self>, f: impl FnOnce() -> R) -> R {
        struct Restore(Option<Arc<ExecutionContext>>);

        impl Drop for Restore {
            fn drop(&mut self) {
                let previous = self.0.take();
                THREAD_CONTEXT.with(|cell| *cell.borrow_mut() = previous);
            }
        }

        let _restore = Restore(THREAD_CONTEXT.with(|cell| cell.borrow_mut().replace(self.clone())));
        f()
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    /// Count of overrides currently active for the dependency in this context
    #[must_use]
    pub fn override_depth(&self, dependency: DependencyId) -> usize {
        self.slots.lock().get(&dependency).map_or(0, |slot| slot.overrides.len())
    }

    /// Count of scopes currently published for the dependency in this context, inherited ones included
    #[must_use]
    pub fn scope_depth(&self, dependency: DependencyId) -> usize {
        self.slots.lock().get(&dependency).map_or(0, |slot| slot.scopes.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl ExecutionContext {
    fn with_slot<R>(&self, dependency: DependencyId, f: impl FnOnce(&mut Slot) -> R) -> R {
        let mut slots = self.slots.lock();
        let slot = slots.entry(dependency).or_default();
        let result = f(slot);
        if slot.is_empty() {
            slots.remove(&dependency);
        }
        result
    }

    pub(crate) fn push_override(&self, dependency: DependencyId, record: OverrideRecord) -> usize {
        self.with_slot(dependency, |slot| {
            slot.overrides.push(record);
            slot.overrides.len()
        })
    }

    /// Pops the override with `entry_id`.
    /// If it isn't on top, it's still removed so the stack doesn't keep a dead entry.
    pub(crate) fn pop_override(&self, dependency: &DependencyInfo, entry_id: u64) -> Result<(), StackCorruption> {
        self.with_slot(dependency.id, |slot| {
            let found = slot.overrides.last().map(|record| record.entry_id);
            if found == Some(entry_id) {
                slot.overrides.pop();
                return Ok(());
            }

            slot.overrides.retain(|record| record.entry_id != entry_id);
            Err(StackCorruption {
                dependency: *dependency,
                context: self.id,
                expected: entry_id,
                found,
            })
        })
    }

    #[must_use]
    pub(crate) fn top_override(&self, dependency: DependencyId) -> Option<RcAny> {
        self.slots
            .lock()
            .get(&dependency)
            .and_then(|slot| slot.overrides.last())
            .map(|record| record.entry.clone())
    }

    pub(crate) fn push_scope(&self, dependency: DependencyId, handle: Arc<ScopeHandle>) {
        self.with_slot(dependency, |slot| slot.scopes.push(handle));
    }

    pub(crate) fn pop_scope(&self, dependency: &DependencyInfo, handle_id: u64) -> Result<(), StackCorruption> {
        self.with_slot(dependency.id, |slot| {
            let found = slot.scopes.last().map(|handle| handle.id());
            if found == Some(handle_id) {
                slot.scopes.pop();
                return Ok(());
            }

            slot.scopes.retain(|handle| handle.id() != handle_id);
            Err(StackCorruption {
                dependency: *dependency,
                context: self.id,
                expected: handle_id,
                found,
            })
        })
    }

    #[must_use]
    pub(crate) fn top_scope(&self, dependency: DependencyId) -> Option<Arc<ScopeHandle>> {
        self.slots.lock().get(&dependency).and_then(|slot| slot.scopes.last()).cloned()
    }
}

/// Spawns a thread running `f` in a context branched from the current one
pub fn spawn<F, T>(policy: InheritPolicy, f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let context = ExecutionContext::current().branch(policy);
    thread::spawn(move || context.run(f))
}
