use core::future::Future;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{Arc, OnceLock, Weak},
};
use tokio::task::{self, JoinHandle};
use tracing::debug;

use crate::{config::InheritPolicy, context::ExecutionContext};

tokio::task_local! {
    static TASK_CONTEXT: Arc<ExecutionContext>;
}

/// Contexts of tasks spawned without [`spawn`].
/// An entry lives as long as a guard of its task holds the context.
type BareTaskContexts = Mutex<HashMap<task::Id, Weak<ExecutionContext>>>;

fn bare_task_contexts() -> &'static BareTaskContexts {
    static CONTEXTS: OnceLock<BareTaskContexts> = OnceLock::new();
    CONTEXTS.get_or_init(Default::default)
}

/// Context of the running task, if the caller runs inside one.
///
/// Tasks without an installed context get an isolated one keyed by their task id,
/// so two tasks polled on the same thread never share overrides or scopes.
pub(crate) fn task_context() -> Option<Arc<ExecutionContext>> {
    if let Ok(context) = TASK_CONTEXT.try_with(Arc::clone) {
        return Some(context);
    }

    let id = task::try_id()?;
    let mut contexts = bare_task_contexts().lock();
    if let Some(context) = contexts.get(&id).and_then(Weak::upgrade) {
        return Some(context);
    }

    contexts.retain(|_, context| context.strong_count() > 0);
    let context = ExecutionContext::isolated();
    contexts.insert(id, Arc::downgrade(&context));
    debug!(task = %id, context = %context.id(), "Context bound to task");
    Some(context)
}

/// Runs `future` in a fresh isolated context
pub async fn scope<F: Future>(future: F) -> F::Output {
    scope_with(ExecutionContext::isolated(), future).await
}

/// Runs `future` with `context` as its execution context.
/// Resolutions inside `future` use it on whatever thread the future is polled on.
pub async fn scope_with<F: Future>(context: Arc<ExecutionContext>, future: F) -> F::Output {
    TASK_CONTEXT.scope(context, future).await
}

/// Spawns a task running in a context branched from the current one
///
/// # Panics
/// Panics if called outside of a tokio runtime
pub fn spawn<F>(policy: InheritPolicy, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let context = ExecutionContext::current().branch(policy);
    tokio::spawn(TASK_CONTEXT.scope(context, future))
}

#[cfg(test)]
mod tests {
    use super::{scope, scope_with, spawn};
    use crate::{config::InheritPolicy, context::ExecutionContext};

    use std::{sync::Arc, time::Duration};
    use tokio::sync::oneshot;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_scope_installs_task_context() {
        let thread_context = ExecutionContext::current();

        let (first, second) = scope(async {
            let first = ExecutionContext::current();
            tokio::task::yield_now().await;
            (first, ExecutionContext::current())
        })
        .await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_ne!(first.id(), thread_context.id());
        assert!(Arc::ptr_eq(&thread_context, &ExecutionContext::current()));

        let context = ExecutionContext::isolated();
        let inside = scope_with(context.clone(), async { ExecutionContext::current().id() }).await;
        assert_eq!(inside, context.id());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[traced_test]
    async fn test_spawned_tasks_are_isolated() {
        let parent = ExecutionContext::current();

        let (first, second) = tokio::join!(
            spawn(InheritPolicy::Isolated, async { ExecutionContext::current() }),
            spawn(InheritPolicy::Snapshot, async { ExecutionContext::current() }),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first.id(), second.id());
        assert_eq!(first.parent(), Some(parent.id()));
        assert_eq!(second.parent(), Some(parent.id()));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_bare_tasks_get_own_contexts() {
        let thread_context = ExecutionContext::current();
        let (held, task_held) = oneshot::channel::<()>();

        let first = tokio::spawn(async move {
            let context = ExecutionContext::current();
            held.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            // Same context across awaits while something holds it
            assert!(Arc::ptr_eq(&context, &ExecutionContext::current()));
            context.id()
        });
        task_held.await.unwrap();
        let second = tokio::spawn(async { ExecutionContext::current().id() });

        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        assert_ne!(first, second);
        assert_ne!(first, thread_context.id());
        assert_ne!(second, thread_context.id());
        assert!(Arc::ptr_eq(&thread_context, &ExecutionContext::current()));
    }
}
