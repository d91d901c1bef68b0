//! Host lifecycle hooks.
//!
//! [`Lifecycle::pre_start`] runs before the host starts its services: it
//! freezes the registry, opens the session and injects every participating
//! service. [`Lifecycle::post_stop`] runs after they stopped and tears the
//! session down.

use std::sync::Arc;

use crate::declaration::Declaration;
use crate::error::{BoxError, Result};
use crate::injector::InjectionReport;
use crate::manager::Manager;
use crate::provider::{Provided, Provider};
use crate::target::{AttributeState, Target};
use crate::value::{Arguments, Value};

/// Name of the built-in provider yielding the current tokio runtime
/// [`Handle`](tokio::runtime::Handle).
pub const RUNTIME_PROVIDER: &str = "runtime";

/// A host service that takes part in dependency injection.
pub trait Service: Target {
    /// Service name, used in logs.
    fn name(&self) -> &str;

    /// Declared dependencies. Services with an empty declaration are skipped.
    fn declaration(&self) -> Declaration {
        Declaration::new()
    }
}

impl<T: Target + ?Sized> Target for Box<T> {
    fn attribute_state(&self, attribute: &str) -> Result<AttributeState> {
        (**self).attribute_state(attribute)
    }

    fn inject(&mut self, attribute: &str, value: Value) -> Result<()> {
        (**self).inject(attribute, value)
    }
}

impl<S: Service + ?Sized> Service for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn declaration(&self) -> Declaration {
        (**self).declaration()
    }
}

async fn current_runtime(_args: Arguments) -> std::result::Result<Provided, BoxError> {
    let handle = tokio::runtime::Handle::try_current()?;
    Ok(Provided::value(handle))
}

/// Start/stop hooks bound to one [`Manager`].
#[derive(Debug, Clone)]
pub struct Lifecycle {
    manager: Arc<Manager>,
}

impl Lifecycle {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Prepare dependencies before the host starts.
    ///
    /// Registers the [`RUNTIME_PROVIDER`] unless one exists, freezes the
    /// registry, enters the session and injects each service that declares
    /// dependencies, in order.
    ///
    /// On error the session stays open so [`post_stop`](Self::post_stop) can
    /// release whatever was already resolved.
    ///
    /// # Errors
    /// Session errors from entering, and the first injection error.
    pub async fn pre_start<'a, I, S>(&self, services: I) -> Result<Vec<InjectionReport>>
    where
        I: IntoIterator<Item = &'a mut S>,
        S: Service + ?Sized + 'a,
    {
        let registry = self.manager.registry();
        if !registry.is_frozen() && !registry.contains(RUNTIME_PROVIDER) {
            registry.register(Provider::new(RUNTIME_PROVIDER, current_runtime))?;
        }

        self.manager.freeze();
        self.manager.enter_session()?;

        let mut reports = Vec::new();
        for service in services {
            let declaration = service.declaration();
            if declaration.is_empty() {
                tracing::trace!(service = service.name(), "No dependencies declared");
                continue;
            }

            match self.manager.inject(&mut *service, &declaration).await {
                Ok(report) => {
                    tracing::debug!(service = service.name(), "Service dependencies injected");
                    reports.push(report);
                }
                Err(e) => {
                    tracing::error!(
                        service = service.name(),
                        provider = e.provider(),
                        fatal = e.is_startup_fatal(),
                        error = %e,
                        "Dependency injection failed"
                    );
                    return Err(e);
                }
            }
        }
        Ok(reports)
    }

    /// Exit the session after the host stopped.
    ///
    /// # Errors
    /// `NoActiveSession` or the aggregate `Teardown` error.
    pub async fn post_stop(&self) -> Result<()> {
        self.manager.exit_session().await
    }
}
