//! Provider resolution through the manager: transitive dependencies, value
//! sharing and the not-found marker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use keel_inject::{Arguments, Error, Manager, Provided, Provider};
use pretty_assertions::assert_eq;

fn counted(calls: &Arc<AtomicUsize>) -> Arc<AtomicUsize> {
    Arc::clone(calls)
}

/// `foo` yields "Foo", `spam` repeats its `foo` dependency three times.
fn foo_spam(manager: &Manager, calls: &Arc<AtomicUsize>) {
    let foo_calls = counted(calls);
    manager
        .provide("foo", Vec::<String>::new(), move |_args: Arguments| {
            foo_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Provided::value(String::from("Foo"))) }
        })
        .unwrap();
    manager
        .provide("spam", ["foo"], |args: Arguments| async move {
            let foo = args.get::<String>("foo")?;
            Ok(Provided::value(foo.repeat(3)))
        })
        .unwrap();
}

#[tokio::test]
async fn transitive_dependency_resolved_first() {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = Manager::new();
    foo_spam(&manager, &calls);
    manager.freeze();
    manager.enter_session().unwrap();

    let spam = manager
        .call(["spam"], |args| async move { args.get::<String>("spam") })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(spam.as_str(), "FooFooFoo");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    manager.exit_session().await.unwrap();
}

#[tokio::test]
async fn shared_dependency_invoked_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = Manager::new();
    foo_spam(&manager, &calls);
    manager
        .provide("eggs", ["foo"], |args: Arguments| async move {
            let foo = args.get::<String>("foo")?;
            Ok(Provided::value(foo.to_lowercase()))
        })
        .unwrap();
    manager.freeze();
    let session = manager.enter_session().unwrap();

    let args = session.resolve(["spam", "eggs", "foo"]).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(args.get::<String>("eggs").unwrap().as_str(), "foo");

    let again = session.resolve(["foo"]).await.unwrap();
    assert!(Arc::ptr_eq(
        args.raw("foo").unwrap(),
        again.raw("foo").unwrap()
    ));
    assert_eq!(session.resolved_count(), 3);

    manager.exit_session().await.unwrap();
}

#[tokio::test]
async fn unit_output_is_not_the_not_found_marker() {
    let manager = Manager::new();
    manager.register(Provider::constant("nothing", ())).unwrap();
    manager.register(Provider::constant("none", Option::<u8>::None)).unwrap();
    manager.freeze();
    let session = manager.enter_session().unwrap();

    let args = session.resolve(["nothing", "none", "absent"]).await.unwrap();
    assert!(!args.resolution("nothing").unwrap().is_not_found());
    assert!(!args.resolution("none").unwrap().is_not_found());
    assert!(args.resolution("absent").unwrap().is_not_found());
    assert_eq!(*args.get::<Option<u8>>("none").unwrap(), None);
    assert_eq!(args.names().collect::<Vec<_>>(), vec!["nothing", "none", "absent"]);

    manager.exit_session().await.unwrap();
}

#[tokio::test]
async fn consumer_decides_on_missing_arguments() {
    let manager = Manager::new();
    manager.freeze();
    manager.enter_session().unwrap();

    let fallback = manager
        .call(["config"], |args| async move {
            args.try_get::<String>("config")
                .unwrap()
                .map_or_else(|| String::from("defaults"), |c| (*c).clone())
        })
        .await
        .unwrap();
    assert_eq!(fallback, "defaults");

    manager.exit_session().await.unwrap();
}

#[tokio::test]
async fn provider_missing_its_dependency() {
    let manager = Manager::new();
    manager
        .provide("spam", ["foo"], |_args: Arguments| async {
            Ok(Provided::value(0u8))
        })
        .unwrap();
    manager.freeze();
    let session = manager.enter_session().unwrap();

    let err = session.resolve(["spam"]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Required dependency 'foo' was not found (required by 'spam')"
    );
    assert_eq!(err.provider(), Some("foo"));
    assert!(!session.is_resolved("spam"));

    manager.exit_session().await.unwrap();
}

#[tokio::test]
async fn cycle_detected_before_any_factory_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = Manager::new();
    for (name, dep) in [("a", "b"), ("b", "c"), ("c", "a")] {
        let calls = counted(&calls);
        manager
            .provide(name, [dep], move |_args: Arguments| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Provided::value(())) }
            })
            .unwrap();
    }
    manager.freeze();
    let session = manager.enter_session().unwrap();

    let err = session.resolve(["a"]).await.unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
    assert!(err.to_string().contains("a -> b -> c -> a"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    manager.exit_session().await.unwrap();
}

#[tokio::test]
async fn failing_provider_surfaces_and_is_retried_next_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = Manager::new();
    let attempts = counted(&calls);
    manager
        .provide("flaky", Vec::<String>::new(), move |_args: Arguments| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err("connection refused".into())
                } else {
                    Ok(Provided::value(attempt))
                }
            }
        })
        .unwrap();
    manager.freeze();
    let session = manager.enter_session().unwrap();

    let err = session.resolve(["flaky"]).await.unwrap_err();
    assert_eq!(err.to_string(), "Provider 'flaky' failed: connection refused");
    assert_eq!(session.pending_teardowns(), 0);

    let args = session.resolve(["flaky"]).await.unwrap();
    assert_eq!(*args.get::<usize>("flaky").unwrap(), 1);

    manager.exit_session().await.unwrap();
}

#[tokio::test]
async fn each_session_gets_fresh_values() {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = Manager::new();
    foo_spam(&manager, &calls);
    manager.freeze();

    let first = manager.enter_session().unwrap();
    let a = first.resolve(["foo"]).await.unwrap();
    manager.exit_session().await.unwrap();

    let second = manager.enter_session().unwrap();
    let b = second.resolve(["foo"]).await.unwrap();
    manager.exit_session().await.unwrap();

    assert_ne!(first.id(), second.id());
    assert!(!Arc::ptr_eq(a.raw("foo").unwrap(), b.raw("foo").unwrap()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
