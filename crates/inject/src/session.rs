//! Resolution session: per-session value cache, single-flight resolution
//! and LIFO teardown.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::try_join_all;
use parking_lot::Mutex;
use tokio::sync::{OnceCell, RwLock};

use crate::config::Config;
use crate::error::{Error, Result, TeardownFailure};
use crate::provider::{BoxFuture, Provider, Teardown};
use crate::registry::RegistrySnapshot;
use crate::value::{Arguments, Resolution, Value};

tokio::task_local! {
    /// Id of the session whose resolution gate the current task holds.
    static RESOLVING: String;
}

struct PendingTeardown {
    provider: String,
    action: Teardown,
}

/// One resolution lifetime.
///
/// Every provider is invoked at most once per session; all requesters share
/// the produced value. Teardowns are recorded in resolution order and run in
/// reverse on [`exit`](Session::exit).
pub struct Session {
    id: String,
    registry: Arc<RegistrySnapshot>,
    concurrent: bool,
    teardown_timeout: Option<Duration>,
    /// provider name -> value cell; an empty cell is an in-flight or failed
    /// resolution
    cells: DashMap<String, Arc<OnceCell<Value>>>,
    teardowns: Mutex<Vec<PendingTeardown>>,
    /// `true` once the session is closed. Outermost resolutions hold the
    /// read side, exit takes the write side.
    closed: RwLock<bool>,
}

impl Session {
    /// Open a session over a frozen registry snapshot.
    pub fn new(registry: Arc<RegistrySnapshot>, config: &Config) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            registry,
            concurrent: config.concurrent_resolution,
            teardown_timeout: config.teardown_timeout(),
            cells: DashMap::new(),
            teardowns: Mutex::new(Vec::new()),
            closed: RwLock::new(false),
        }
    }

    /// Unique session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolve a set of provider names.
    ///
    /// Names without a provider resolve to [`Resolution::NotFound`].
    ///
    /// # Errors
    /// `SessionClosed`, `CyclicDependency`, `MissingDependency` (for a
    /// provider's own dependency) and `ProviderFailed`.
    #[tracing::instrument(name = "session.resolve", skip_all, fields(session = %self.id))]
    pub async fn resolve<I, S>(&self, names: I) -> Result<Arguments>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        // A factory resolving through this session already runs under the
        // outer resolution's gate. Queuing for the gate again would wait
        // behind a pending exit that itself waits for the outer resolution.
        if RESOLVING.try_with(|id| *id == self.id).unwrap_or(false) {
            tracing::trace!("Nested resolution");
            return self.resolve_names(names).await;
        }

        let closed = self.closed.read().await;
        if *closed {
            return Err(Error::SessionClosed {
                session_id: self.id.clone(),
            });
        }

        let outcome = RESOLVING
            .scope(self.id.clone(), self.resolve_names(names))
            .await;
        drop(closed);
        outcome
    }

    async fn resolve_names(&self, names: Vec<String>) -> Result<Arguments> {
        for name in &names {
            self.registry.graph().ensure_acyclic_from(name)?;
        }

        let resolutions = self.resolve_all(&names).await?;

        let mut args = Arguments::new();
        for (name, resolution) in names.into_iter().zip(resolutions) {
            args.insert(name, resolution);
        }
        Ok(args)
    }

    /// Resolve `names` and invoke `consumer` with the result.
    ///
    /// Names without a provider are passed as `NotFound`; the consumer
    /// decides whether that is fatal.
    pub async fn call<I, S, F, Fut, T>(&self, names: I, consumer: F) -> Result<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(Arguments) -> Fut,
        Fut: Future<Output = T>,
    {
        let args = self.resolve(names).await?;
        Ok(consumer(args).await)
    }

    async fn resolve_all(&self, names: &[String]) -> Result<Vec<Resolution>> {
        if self.concurrent {
            try_join_all(names.iter().map(|name| self.resolve_one(name))).await
        } else {
            let mut resolutions = Vec::with_capacity(names.len());
            for name in names {
                resolutions.push(self.resolve_one(name).await?);
            }
            Ok(resolutions)
        }
    }

    fn resolve_one<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Resolution>> {
        Box::pin(async move {
            let Some(provider) = self.registry.get(name) else {
                return Ok(Resolution::NotFound);
            };

            let cell = Arc::clone(&self.cells.entry(name.to_string()).or_default());
            if let Some(value) = cell.get() {
                tracing::trace!(provider = name, "Cache hit");
                return Ok(Resolution::Found(Arc::clone(value)));
            }

            let value = cell.get_or_try_init(|| self.create(provider)).await?;
            Ok(Resolution::Found(Arc::clone(value)))
        })
    }

    async fn create(&self, provider: &Provider) -> Result<Value> {
        let name = provider.name();

        if let Some(missing) = provider
            .dependencies()
            .iter()
            .find(|dep| self.registry.get(dep).is_none())
        {
            return Err(Error::MissingDependency {
                dependency: missing.clone(),
                required_by: Some(name.to_string()),
            });
        }

        let resolutions = self.resolve_all(provider.dependencies()).await?;
        let mut args = Arguments::new();
        for (dep, resolution) in provider.dependencies().iter().zip(resolutions) {
            args.insert(dep.clone(), resolution);
        }

        tracing::debug!(provider = name, "Invoking provider");
        let provided = provider
            .invoke(args)
            .await
            .map_err(|source| Error::ProviderFailed {
                provider: name.to_string(),
                source,
            })?;

        let (value, teardown) = provided.into_parts();
        if let Some(action) = teardown {
            self.teardowns.lock().push(PendingTeardown {
                provider: name.to_string(),
                action,
            });
        }
        Ok(value)
    }

    /// Number of providers resolved so far.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Whether `name` has been resolved in this session.
    #[must_use]
    pub fn is_resolved(&self, name: &str) -> bool {
        self.cells
            .get(name)
            .is_some_and(|cell| cell.value().initialized())
    }

    /// Number of teardown actions waiting for exit.
    #[must_use]
    pub fn pending_teardowns(&self) -> usize {
        self.teardowns.lock().len()
    }

    /// Whether [`exit`](Self::exit) has run.
    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }

    /// Close the session and run every pending teardown, last resolved first.
    ///
    /// Waits for in-flight resolutions before tearing anything down. A
    /// failing, panicking or timed-out teardown does not stop the rest.
    ///
    /// # Errors
    /// `SessionClosed` if already exited, `Teardown` with every failure
    /// otherwise.
    #[tracing::instrument(name = "session.exit", skip_all, fields(session = %self.id))]
    pub async fn exit(&self) -> Result<()> {
        {
            let mut closed = self.closed.write().await;
            if *closed {
                return Err(Error::SessionClosed {
                    session_id: self.id.clone(),
                });
            }
            *closed = true;
        }

        let pending = std::mem::take(&mut *self.teardowns.lock());
        tracing::debug!(teardowns = pending.len(), "Unwinding session");

        let mut failures = Vec::new();
        for PendingTeardown { provider, action } in pending.into_iter().rev() {
            if let Err(failure) = self.run_teardown(&provider, action).await {
                tracing::warn!(provider = %provider, reason = %failure.reason, "Teardown failed");
                failures.push(failure);
            }
        }
        self.cells.clear();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Teardown { failures })
        }
    }

    async fn run_teardown(
        &self,
        provider: &str,
        action: Teardown,
    ) -> std::result::Result<(), TeardownFailure> {
        let failure = |reason: String, source| TeardownFailure {
            provider: provider.to_string(),
            reason,
            source,
        };

        // The action may panic before it yields a future, so it is called
        // inside the guard.
        let guarded = AssertUnwindSafe(async move { action().await }).catch_unwind();
        let outcome = match self.teardown_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(failure(
                        format!("timed out after {}ms", limit.as_millis()),
                        None,
                    ));
                }
            },
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(())) => {
                tracing::trace!(provider, "Teardown complete");
                Ok(())
            }
            Ok(Err(source)) => Err(failure(source.to_string(), Some(source))),
            Err(_) => Err(failure("panicked".to_string(), None)),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("resolved", &self.resolved_count())
            .field("pending_teardowns", &self.pending_teardowns())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provided;
    use crate::registry::Registry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session(registry: &Registry) -> Session {
        Session::new(registry.freeze(), &Config::default())
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let registry = Registry::new();
        let session = session(&registry);
        let args = session.resolve(["nope"]).await.unwrap();
        assert!(args.resolution("nope").unwrap().is_not_found());
        assert_eq!(session.resolved_count(), 0);
    }

    #[tokio::test]
    async fn cached_value_is_reused() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        let counter = Arc::clone(&calls);
        registry
            .provide("obj", Vec::<String>::new(), move |_args: Arguments| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(Provided::value(String::from("x"))) }
            })
            .unwrap();
        let session = session(&registry);

        let first = session.resolve(["obj"]).await.unwrap();
        let second = session.resolve(["obj"]).await.unwrap();
        assert!(Arc::ptr_eq(
            &first.get::<String>("obj").unwrap(),
            &second.get::<String>("obj").unwrap()
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(session.is_resolved("obj"));
    }

    #[tokio::test]
    async fn failed_provider_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        let counter = Arc::clone(&attempts);
        registry
            .provide("flaky", Vec::<String>::new(), move |_args: Arguments| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err("first call fails".into())
                    } else {
                        Ok(Provided::value(n))
                    }
                }
            })
            .unwrap();
        let session = session(&registry);

        let err = session.resolve(["flaky"]).await.unwrap_err();
        assert!(matches!(err, Error::ProviderFailed { ref provider, .. } if provider == "flaky"));
        assert!(!session.is_resolved("flaky"));

        let args = session.resolve(["flaky"]).await.unwrap();
        assert_eq!(*args.get::<usize>("flaky").unwrap(), 1);
    }

    #[tokio::test]
    async fn provider_with_unregistered_dependency_fails() {
        let registry = Registry::new();
        registry
            .provide("repo", ["db"], |_args: Arguments| async {
                Ok(Provided::value(()))
            })
            .unwrap();
        let session = session(&registry);

        let err = session.resolve(["repo"]).await.unwrap_err();
        match err {
            Error::MissingDependency {
                dependency,
                required_by,
            } => {
                assert_eq!(dependency, "db");
                assert_eq!(required_by.as_deref(), Some("repo"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn exit_twice_is_rejected() {
        let registry = Registry::new();
        let session = session(&registry);
        session.exit().await.unwrap();
        assert!(session.is_closed().await);
        assert!(matches!(
            session.exit().await,
            Err(Error::SessionClosed { .. })
        ));
        assert!(matches!(
            session.resolve(["x"]).await,
            Err(Error::SessionClosed { .. })
        ));
    }

    #[tokio::test]
    async fn call_passes_resolved_arguments() {
        let registry = Registry::new();
        registry
            .provide("n", Vec::<String>::new(), |_args: Arguments| async {
                Ok(Provided::value(21u32))
            })
            .unwrap();
        let session = session(&registry);

        let doubled = session
            .call(["n", "absent"], |args| async move {
                assert!(args.try_get::<u32>("absent").unwrap().is_none());
                *args.get::<u32>("n").unwrap() * 2
            })
            .await
            .unwrap();
        assert_eq!(doubled, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_teardown_times_out_but_others_run() {
        let ran = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        let ran_fast = Arc::clone(&ran);
        registry
            .provide("fast", Vec::<String>::new(), move |_args: Arguments| {
                let ran = Arc::clone(&ran_fast);
                async move {
                    Ok(Provided::scoped((), move |_| async move {
                        ran.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }))
                }
            })
            .unwrap();
        registry
            .provide("slow", Vec::<String>::new(), |_args: Arguments| async {
                Ok(Provided::scoped((), |_| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }))
            })
            .unwrap();
        let config = Config::default()
            .with_teardown_timeout(Duration::from_millis(100))
            .sequential();
        let session = Session::new(registry.freeze(), &config);

        session.resolve(["fast", "slow"]).await.unwrap();
        assert_eq!(session.pending_teardowns(), 2);

        let err = session.exit().await.unwrap_err();
        let Error::Teardown { failures } = err else {
            panic!("expected teardown error");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].provider, "slow");
        assert!(failures[0].reason.contains("timed out"));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
