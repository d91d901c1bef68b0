//! # Keel Inject
//!
//! Session-scoped dependency resolution and injection.
//!
//! Providers are named async factories with declared dependencies. They are
//! collected in a [`Registry`], frozen, and resolved inside a [`Session`]:
//! each provider runs at most once per session, every consumer shares its
//! value, and resource-producing providers are torn down in reverse
//! resolution order when the session exits.
//!
//! The [`Injector`] writes resolved values onto [`Target`]s. Values supplied
//! at construction are never overwritten, defaults survive a missing
//! provider, and an attribute with neither fails with
//! [`Error::MissingDependency`].
//!
//! [`Manager`] ties a registry to at most one open session and
//! [`Lifecycle`] wraps it in host start/stop hooks.

pub mod config;
pub mod declaration;
pub mod error;
pub mod graph;
pub mod injector;
pub mod lifecycle;
pub mod manager;
pub mod provider;
pub mod registry;
pub mod session;
pub mod target;
pub mod value;

pub use config::{Config, OverlapPolicy};
pub use declaration::{Declaration, DependencyRequest};
pub use error::{BoxError, Error, Result, TeardownFailure};
pub use graph::DependencyGraph;
pub use injector::{InjectionReport, Injector};
pub use lifecycle::{Lifecycle, RUNTIME_PROVIDER, Service};
pub use manager::Manager;
pub use provider::{BoxFuture, Factory, Provided, Provider, Teardown};
pub use registry::{Registry, RegistrySnapshot};
pub use session::Session;
pub use target::{AttributeState, Attributes, Slot, Target};
pub use value::{Arguments, Resolution, Value};
