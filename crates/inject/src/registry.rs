//! Provider registry with a one-way freeze.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{BoxError, Error, Result};
use crate::graph::DependencyGraph;
use crate::provider::{Provided, Provider};
use crate::value::Arguments;

/// Registry of named providers.
///
/// Providers accumulate until [`freeze`](Registry::freeze); afterwards the
/// registry is immutable and sessions resolve against a shared snapshot.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    providers: HashMap<String, Provider>,
    snapshot: Option<Arc<RegistrySnapshot>>,
}

/// Immutable view of a frozen registry, shared by sessions.
#[derive(Debug)]
pub struct RegistrySnapshot {
    providers: HashMap<String, Provider>,
    graph: DependencyGraph,
}

impl RegistrySnapshot {
    /// Look up a provider.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    /// The dependency graph over every registered provider.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

impl Registry {
    /// Create an empty, unfrozen registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider.
    ///
    /// Registering a name that already exists replaces the previous provider.
    ///
    /// # Errors
    /// `FrozenRegistry` once [`freeze`](Self::freeze) has been called; the
    /// registry is left unchanged.
    pub fn register(&self, provider: Provider) -> Result<Provider> {
        let mut inner = self.inner.write();
        if inner.snapshot.is_some() {
            return Err(Error::FrozenRegistry {
                provider: provider.name().to_string(),
            });
        }

        let name = provider.name().to_string();
        if inner.providers.insert(name.clone(), provider.clone()).is_some() {
            tracing::debug!(provider = %name, "Replaced provider");
        } else {
            tracing::debug!(
                provider = %name,
                dependencies = ?provider.dependencies(),
                "Registered provider"
            );
        }
        Ok(provider)
    }

    /// Register a factory under `name` with the given dependencies.
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
        self.register(Provider::new(name, factory).depends_on(dependencies))
    }

    /// Freeze the registry. Idempotent.
    pub fn freeze(&self) -> Arc<RegistrySnapshot> {
        let mut inner = self.inner.write();
        if let Some(snapshot) = &inner.snapshot {
            return Arc::clone(snapshot);
        }

        let graph = DependencyGraph::from_providers(inner.providers.values());
        let snapshot = Arc::new(RegistrySnapshot {
            providers: inner.providers.clone(),
            graph,
        });
        inner.snapshot = Some(Arc::clone(&snapshot));

        tracing::debug!(providers = inner.providers.len(), "Registry frozen");
        snapshot
    }

    /// Whether [`freeze`](Self::freeze) has been called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.read().snapshot.is_some()
    }

    /// The frozen snapshot, if frozen.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        self.inner.read().snapshot.clone()
    }

    /// Whether a provider is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().providers.contains_key(name)
    }

    /// Get a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Provider> {
        self.inner.read().providers.get(name).cloned()
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().providers.len()
    }

    /// Whether no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().providers.is_empty()
    }

    /// Order in which all providers would be initialised, dependencies first.
    ///
    /// # Errors
    /// `CyclicDependency` if the providers form a cycle.
    pub fn resolution_order(&self) -> Result<Vec<String>> {
        let inner = self.inner.read();
        match &inner.snapshot {
            Some(snapshot) => snapshot.graph.topological_sort(),
            None => DependencyGraph::from_providers(inner.providers.values()).topological_sort(),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Registry")
            .field("provider_count", &inner.providers.len())
            .field("frozen", &inner.snapshot.is_some())
            .finish()
    }
}
