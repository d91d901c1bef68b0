//! Engine facade: one registry and at most one open session.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::declaration::Declaration;
use crate::error::{BoxError, Error, Result};
use crate::injector::{InjectionReport, Injector};
use crate::provider::{Provided, Provider};
use crate::registry::{Registry, RegistrySnapshot};
use crate::session::Session;
use crate::target::Target;
use crate::value::Arguments;

/// Owns the provider registry and the currently open session.
///
/// Typical flow: register providers, [`freeze`](Manager::freeze),
/// [`enter_session`](Manager::enter_session), inject targets or call
/// consumers, then [`exit_session`](Manager::exit_session).
///
/// ```no_run
/// # async fn demo() -> keel_inject::Result<()> {
/// use keel_inject::{Arguments, Manager, Provided};
///
/// let manager = Manager::new();
/// manager.provide("foo", Vec::<String>::new(), |_args: Arguments| async {
///     Ok(Provided::value(String::from("Foo")))
/// })?;
/// manager.freeze();
/// manager.enter_session()?;
///
/// let foo = manager
///     .call(["foo"], |args| async move { args.get::<String>("foo") })
///     .await??;
/// assert_eq!(foo.as_str(), "Foo");
///
/// manager.exit_session().await
/// # }
/// ```
pub struct Manager {
    registry: Registry,
    config: Config,
    session: Mutex<Option<Arc<Session>>>,
}

impl Manager {
    /// Manager with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            registry: Registry::new(),
            config,
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a provider. See [`Registry::register`].
    pub fn register(&self, provider: Provider) -> Result<Provider> {
        self.registry.register(provider)
    }

    /// Register a factory. See [`Registry::provide`].
    pub fn provide<I, S, F, Fut>(
        &self,
        name: impl Into<String>,
        dependencies: I,
        factory: F,
    ) -> Result<Provider>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Provided, BoxError>> + Send + 'static,
    {
        self.registry.provide(name, dependencies, factory)
    }

    /// Freeze the registry.
    pub fn freeze(&self) -> Arc<RegistrySnapshot> {
        self.registry.freeze()
    }

    /// Open a session.
    ///
    /// # Errors
    /// `NotFrozen` before [`freeze`](Self::freeze), `SessionAlreadyOpen`
    /// while another session is open.
    pub fn enter_session(&self) -> Result<Arc<Session>> {
        let snapshot = self.registry.snapshot().ok_or(Error::NotFrozen)?;

        let mut slot = self.session.lock();
        if let Some(open) = slot.as_ref() {
            return Err(Error::SessionAlreadyOpen {
                session_id: open.id().to_string(),
            });
        }

        let session = Arc::new(Session::new(snapshot, &self.config));
        tracing::info!(session = session.id(), "Session entered");
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// The open session.
    ///
    /// # Errors
    /// `NoActiveSession` if none is open.
    pub fn session(&self) -> Result<Arc<Session>> {
        self.session.lock().clone().ok_or(Error::NoActiveSession)
    }

    /// Whether a session is open.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Close the open session and run its teardowns.
    ///
    /// The manager accepts a new session as soon as this starts, even when
    /// teardown reports failures.
    ///
    /// # Errors
    /// `NoActiveSession`, or the session's aggregate `Teardown` error.
    pub async fn exit_session(&self) -> Result<()> {
        let session = self.session.lock().take().ok_or(Error::NoActiveSession)?;
        let outcome = session.exit().await;
        match &outcome {
            Ok(()) => tracing::info!(session = session.id(), "Session exited"),
            Err(e) => tracing::info!(session = session.id(), error = %e, "Session exited with errors"),
        }
        outcome
    }

    /// Resolve `names` in the open session and invoke `consumer`.
    pub async fn call<I, S, F, Fut, T>(&self, names: I, consumer: F) -> Result<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(Arguments) -> Fut,
        Fut: Future<Output = T>,
    {
        self.session()?.call(names, consumer).await
    }

    /// Inject `declaration` into `target` using the open session.
    pub async fn inject<T>(&self, target: &mut T, declaration: &Declaration) -> Result<InjectionReport>
    where
        T: Target + ?Sized,
    {
        let session = self.session()?;
        Injector::new(self.config.overlap)
            .inject(&session, target, declaration)
            .await
    }

    /// Drop every provider and the open session, if any.
    ///
    /// An open session is discarded without running its teardowns.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            tracing::warn!(
                session = session.id(),
                pending_teardowns = session.pending_teardowns(),
                "Reset discarded an open session"
            );
        }
        self.registry = Registry::new();
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("session", &self.session.lock().as_ref().map(|s| s.id().to_string()))
            .finish()
    }
}
