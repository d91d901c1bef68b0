//! Provider descriptors: named factories with declared dependencies
//!
//! A provider produces one value per session. Resource-producing providers
//! additionally hand back a teardown action which the session runs on exit.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;
use crate::value::{Arguments, Value};

/// Boxed future returned by factories and teardown actions.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One-shot async cleanup action registered by a scoped provider.
pub type Teardown = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// What a factory produced.
pub enum Provided {
    /// A plain value with nothing to clean up.
    Simple(Value),
    /// A value plus the action that releases it at session exit.
    Scoped(Value, Teardown),
}

impl Provided {
    /// Produce a plain value.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self::Simple(Arc::new(value))
    }

    /// Produce a value together with its teardown.
    ///
    /// The teardown receives the same shared instance consumers saw.
    pub fn scoped<T, F, Fut>(value: T, teardown: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let shared = Arc::new(value);
        let handle = Arc::clone(&shared);
        Self::Scoped(
            shared,
            Box::new(move || Box::pin(teardown(handle)) as BoxFuture<'static, _>),
        )
    }

    /// Whether this output carries a teardown.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        matches!(self, Self::Scoped(..))
    }

    pub(crate) fn into_parts(self) -> (Value, Option<Teardown>) {
        match self {
            Self::Simple(value) => (value, None),
            Self::Scoped(value, teardown) => (value, Some(teardown)),
        }
    }
}

impl fmt::Debug for Provided {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(_) => f.write_str("Simple(..)"),
            Self::Scoped(..) => f.write_str("Scoped(..)"),
        }
    }
}

/// Async factory invoked with the provider's resolved dependencies.
pub trait Factory: Send + Sync + 'static {
    /// Produce the provider's value.
    fn call(&self, args: Arguments) -> BoxFuture<'static, Result<Provided, BoxError>>;
}

impl<F, Fut> Factory for F
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Provided, BoxError>> + Send + 'static,
{
    fn call(&self, args: Arguments) -> BoxFuture<'static, Result<Provided, BoxError>> {
        Box::pin(self(args))
    }
}

/// A named factory and the names of the providers it depends on.
///
/// Cheap to clone; the factory is shared. Providers are static descriptors
/// reused by every session.
#[derive(Clone)]
pub struct Provider {
    name: String,
    dependencies: Vec<String>,
    factory: Arc<dyn Factory>,
}

impl Provider {
    /// Create a provider with no dependencies from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Provided, BoxError>> + Send + 'static,
    {
        Self::from_factory(name, factory)
    }

    /// Create a provider from any [`Factory`] implementation.
    pub fn from_factory(name: impl Into<String>, factory: impl Factory) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Provider that always yields a clone of `value`.
    pub fn constant<T>(name: impl Into<String>, value: T) -> Self
    where
        T: Any + Clone + Send + Sync,
    {
        Self::new(name, move |_args: Arguments| {
            let value = value.clone();
            async move { Ok(Provided::value(value)) }
        })
    }

    /// Declare the dependencies the factory receives, in order.
    #[must_use]
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// The provider's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the providers this one depends on.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn invoke(&self, args: Arguments) -> BoxFuture<'static, Result<Provided, BoxError>> {
        self.factory.call(args)
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}
