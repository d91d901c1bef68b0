//! Provider dependency graph: cycle detection and resolution order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{Error, Result};
use crate::provider::Provider;

/// Dependency graph over provider names.
///
/// Edges point from a provider to the providers it depends on. Names that
/// are depended upon but never registered appear as leaf nodes. The graph
/// tolerates cycles while it is being built; they are reported when a
/// resolution would traverse them.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// provider -> what it depends on, in declaration order
    dependencies: HashMap<String, Vec<String>>,
    /// provider -> what depends on it
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a set of providers.
    pub fn from_providers<'a>(providers: impl IntoIterator<Item = &'a Provider>) -> Self {
        let mut graph = Self::new();
        for provider in providers {
            graph.add_node(provider.name());
            for dep in provider.dependencies() {
                graph.insert_edge(provider.name(), dep);
            }
        }
        graph
    }

    fn add_node(&mut self, node: &str) {
        self.dependencies.entry(node.to_string()).or_default();
    }

    /// Record that `provider` depends on `depends_on`. Duplicate edges are
    /// ignored.
    pub fn insert_edge(&mut self, provider: impl Into<String>, depends_on: impl Into<String>) {
        let provider = provider.into();
        let depends_on = depends_on.into();

        let deps = self.dependencies.entry(provider.clone()).or_default();
        if deps.contains(&depends_on) {
            return;
        }
        deps.push(depends_on.clone());

        self.dependents
            .entry(depends_on)
            .or_default()
            .push(provider);
    }

    /// Direct dependencies of a provider
    #[must_use]
    pub fn dependencies_of(&self, provider: &str) -> &[String] {
        self.dependencies.get(provider).map_or(&[], Vec::as_slice)
    }

    /// Direct dependents of a provider (what depends on it)
    #[must_use]
    pub fn dependents_of(&self, provider: &str) -> &[String] {
        self.dependents.get(provider).map_or(&[], Vec::as_slice)
    }

    /// Find a cycle reachable from `start`.
    ///
    /// # Returns
    /// `Some(path)` where the last element depends on the first, `None` if
    /// every path from `start` terminates.
    #[must_use]
    pub fn cycle_from(&self, start: &str) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut on_path = HashSet::new();
        let mut path = Vec::new();
        self.cycle_dfs(start, &mut visited, &mut on_path, &mut path)
    }

    /// Detect a cycle anywhere in the graph
    #[must_use]
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut on_path = HashSet::new();
        let mut path = Vec::new();

        let mut nodes: Vec<&String> = self.dependencies.keys().collect();
        nodes.sort();
        for node in nodes {
            if !visited.contains(node.as_str())
                && let Some(cycle) = self.cycle_dfs(node, &mut visited, &mut on_path, &mut path)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn cycle_dfs(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        on_path: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        on_path.insert(node.to_string());
        path.push(node.to_string());

        let mut found = None;
        for dep in self.dependencies_of(node) {
            if on_path.contains(dep.as_str()) {
                let start = path.iter().position(|p| p == dep).unwrap_or(0);
                found = Some(path[start..].to_vec());
                break;
            }
            if !visited.contains(dep.as_str()) {
                found = self.cycle_dfs(dep, visited, on_path, path);
                if found.is_some() {
                    break;
                }
            }
        }

        on_path.remove(node);
        path.pop();
        found
    }

    /// Fail with `CyclicDependency` if a cycle is reachable from `start`.
    pub fn ensure_acyclic_from(&self, start: &str) -> Result<()> {
        match self.cycle_from(start) {
            Some(cycle) => Err(cycle_error(&cycle)),
            None => Ok(()),
        }
    }

    /// Topological order of every node, dependencies first.
    ///
    /// Ties are broken by name so the order is stable.
    ///
    /// # Errors
    /// `CyclicDependency` if the graph has a cycle.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        // Kahn's algorithm over "depends on" edges
        let mut remaining: HashMap<&str, usize> = HashMap::new();
        for (node, deps) in &self.dependencies {
            remaining.insert(node.as_str(), deps.len());
            for dep in deps {
                remaining.entry(dep.as_str()).or_insert(0);
            }
        }

        let mut ready: Vec<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
            .collect();
        ready.sort_unstable();
        let mut queue: VecDeque<&str> = ready.into();

        let mut sorted = Vec::with_capacity(remaining.len());
        while let Some(node) = queue.pop_front() {
            sorted.push(node.to_string());

            let mut unlocked = Vec::new();
            for dependent in self.dependents_of(node) {
                let Some(count) = remaining.get_mut(dependent.as_str()) else {
                    continue;
                };
                *count -= 1;
                if *count == 0 {
                    unlocked.push(dependent.as_str());
                }
            }
            unlocked.sort_unstable();
            queue.extend(unlocked);
        }

        if sorted.len() != remaining.len()
            && let Some(cycle) = self.detect_cycle()
        {
            return Err(cycle_error(&cycle));
        }

        Ok(sorted)
    }
}

fn cycle_error(cycle: &[String]) -> Error {
    let mut display = cycle.to_vec();
    if let Some(first) = cycle.first() {
        display.push(first.clone());
    }
    Error::CyclicDependency {
        cycle: display.join(" -> "),
    }
}
