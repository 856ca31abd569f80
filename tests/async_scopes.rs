use diwrap::{
    async_impl::{scope, spawn, AsyncContextualDependency, AsyncDependency, AsyncDependencyResolver as _},
    Dependency, ExecutionContext, InheritPolicy, InstantiateErrorKind, ResolveErrorKind,
};
use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::oneshot;

struct Session(&'static str);

fn session(released: &Arc<AtomicU8>) -> AsyncContextualDependency<Session> {
    let released = released.clone();
    AsyncContextualDependency::with_finalizer(
        || async { Ok::<_, InstantiateErrorKind>(Session("conn")) },
        move |_: Arc<Session>| {
            let released = released.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                released.fetch_add(1, Ordering::SeqCst);
            }
        },
    )
}

async fn wait_for(counter: &AtomicU8, value: u8) {
    while counter.load(Ordering::SeqCst) != value {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn test_async_transient_and_fake() {
    let dependency = AsyncDependency::new(|| async { Ok::<_, InstantiateErrorKind>(7u32) });
    let double = dependency.inject("x", |x: u32, ()| async move { x * 2 });

    assert_eq!(double.call(()).await.unwrap(), 14);
    let fake = dependency.fake_value(42);
    assert_eq!(double.call(()).await.unwrap(), 84);
    drop(fake);
    assert_eq!(double.call(()).await.unwrap(), 14);
}

#[tokio::test]
async fn test_conn_outside_and_inside_ensure() {
    let released = Arc::new(AtomicU8::new(0));
    let session = session(&released);
    let name = session.inject("x", |session: Arc<Session>, ()| async move { session.0 });

    assert!(matches!(
        name.call(()).await,
        Err(InstantiateErrorKind::Resolve(ResolveErrorKind::MissingContext { .. }))
    ));

    let ensured = session.ensure(move |()| {
        let name = name.clone();
        async move { name.call(()).await }
    });
    assert_eq!(ensured.call(()).await.unwrap().unwrap(), "conn");
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_task_releases_scope() {
    let released = Arc::new(AtomicU8::new(0));
    let session = session(&released);
    let (opened_tx, opened_rx) = oneshot::channel();

    let task = spawn(InheritPolicy::Isolated, {
        let session = session.clone();
        async move {
            session
                .scope(async {
                    let _ = opened_tx.send(());
                    std::future::pending::<()>().await;
                })
                .await
        }
    });

    opened_rx.await.unwrap();
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    tokio::time::timeout(Duration::from_secs(1), wait_for(&released, 1))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tasks_do_not_share_scopes() {
    let released = Arc::new(AtomicU8::new(0));
    let session = session(&released);

    scope(async {
        let guard = session.enter().await.unwrap();
        assert_eq!(session.resolve().await.unwrap().0, "conn");

        let isolated = spawn(InheritPolicy::Isolated, {
            let session = session.clone();
            async move { session.resolve().await.is_err() }
        });
        assert!(isolated.await.unwrap());

        guard.exit().await.unwrap();
        assert!(ExecutionContext::current().is_empty());
    })
    .await;

    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mixed_tuple_injection() {
    let released = Arc::new(AtomicU8::new(0));
    let session = session(&released);
    let port = Dependency::new(|| Ok::<_, InstantiateErrorKind>(5432u16));
    let host = AsyncDependency::new(|| async { Ok::<_, InstantiateErrorKind>("localhost") });

    let address = (host, port, session.clone()).inject_async(
        "address",
        |(host, port, session): (&'static str, u16, Arc<Session>), ()| async move {
            format!("{}@{host}:{port}", session.0)
        },
    );

    assert!(address.call(()).await.is_err());

    let address = session
        .scope(async { address.call(()).await.unwrap() })
        .await
        .unwrap();
    assert_eq!(address, "conn@localhost:5432");
}

#[tokio::test]
async fn test_bare_tasks_do_not_see_each_other_fakes() {
    let dependency = AsyncDependency::new(|| async { Ok::<_, InstantiateErrorKind>(1u8) });
    let (faked_tx, faked_rx) = oneshot::channel();
    let (resolved_tx, resolved_rx) = oneshot::channel();

    let faked = tokio::spawn({
        let dependency = dependency.clone();
        async move {
            let _fake = dependency.fake_value(2);
            faked_tx.send(()).unwrap();
            resolved_rx.await.unwrap();
            dependency.resolve().await.unwrap()
        }
    });

    faked_rx.await.unwrap();
    let other = tokio::spawn({
        let dependency = dependency.clone();
        async move { dependency.resolve().await.unwrap() }
    })
    .await
    .unwrap();
    resolved_tx.send(()).unwrap();

    assert_eq!(other, 1);
    assert_eq!(faked.await.unwrap(), 2);
    assert_eq!(dependency.resolve().await.unwrap(), 1);
}

#[tokio::test]
async fn test_interleaved_fakes_in_bare_tasks() {
    let dependency = AsyncDependency::new(|| async { Ok::<_, InstantiateErrorKind>(0u8) });

    let tasks: Vec<_> = (1..=4u8)
        .map(|value| {
            let dependency = dependency.clone();
            tokio::spawn(async move {
                let fake = dependency.fake_value(value);
                tokio::time::sleep(Duration::from_millis(u64::from(5 - value))).await;
                let resolved = dependency.resolve().await.unwrap();
                // Released while the fakes of other tasks are still active
                assert_eq!(fake.release(), value);
                (resolved, dependency.resolve().await.unwrap())
            })
        })
        .collect();

    for (value, task) in (1..=4u8).zip(tasks) {
        assert_eq!(task.await.unwrap(), (value, 0));
    }
}

#[tokio::test]
async fn test_bare_tasks_do_not_share_scopes() {
    let released = Arc::new(AtomicU8::new(0));
    let session = session(&released);
    let (opened_tx, opened_rx) = oneshot::channel();
    let (resume_tx, resume_rx) = oneshot::channel::<()>();

    let owner = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .scope(async {
                    opened_tx.send(()).unwrap();
                    resume_rx.await.unwrap();
                    session.resolve().await.map(|session| session.0)
                })
                .await
        }
    });

    opened_rx.await.unwrap();
    let other = tokio::spawn({
        let session = session.clone();
        async move { session.resolve().await.err() }
    })
    .await
    .unwrap();
    resume_tx.send(()).unwrap();

    assert!(matches!(
        other,
        Some(InstantiateErrorKind::Resolve(ResolveErrorKind::MissingContext { .. }))
    ));
    assert_eq!(owner.await.unwrap().unwrap().unwrap(), "conn");
    assert_eq!(released.load(Ordering::SeqCst), 1);
}
