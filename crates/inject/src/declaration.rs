//! Dependency declarations and the aggregate request built from them.
//!
//! A target declares its dependencies in two forms:
//! - the list form, where each entry names a dependency that is injected
//!   under the same attribute name, or an explicit `(attribute, dependency)`
//!   pair;
//! - the map form, `attribute -> dependency`, which renames.
//!
//! Both are merged into one [`DependencyRequest`]. When both forms bind the
//! same attribute the map form wins.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value as Json;

use crate::config::OverlapPolicy;
use crate::error::{Error, Result};

/// A target's declared dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declaration {
    list: Vec<(String, String)>,
    map: IndexMap<String, String>,
}

impl Declaration {
    /// An empty declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declaration from the list form only.
    pub fn from_list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().list(names)
    }

    /// Add list-form entries; each name is both attribute and dependency.
    #[must_use]
    pub fn list<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.list.push((name.clone(), name));
        }
        self
    }

    /// Add a list-form `(attribute, dependency)` pair.
    #[must_use]
    pub fn pair(mut self, attribute: impl Into<String>, dependency: impl Into<String>) -> Self {
        self.list.push((attribute.into(), dependency.into()));
        self
    }

    /// Add map-form entries, `attribute -> dependency`.
    #[must_use]
    pub fn map<I, A, D>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (A, D)>,
        A: Into<String>,
        D: Into<String>,
    {
        for (attribute, dependency) in entries {
            self.map.insert(attribute.into(), dependency.into());
        }
        self
    }

    /// Build a declaration from untyped metadata.
    ///
    /// `list` must be an array whose entries are names or
    /// `[attribute, dependency]` pairs; `map` must be an object whose values
    /// are names. `null` is treated as absent.
    ///
    /// # Errors
    /// `Validation` for any other shape.
    pub fn from_json(list: Option<&Json>, map: Option<&Json>) -> Result<Self> {
        let mut declaration = Self::new();

        match list {
            None | Some(Json::Null) => {}
            Some(Json::Array(entries)) => {
                for entry in entries {
                    let (attribute, dependency) = list_entry(entry)?;
                    declaration.list.push((attribute, dependency));
                }
            }
            Some(other) => {
                return Err(Error::validation(format!(
                    "dependency list must be an array, got {}",
                    json_kind(other)
                )));
            }
        }

        match map {
            None | Some(Json::Null) => {}
            Some(Json::Object(entries)) => {
                for (attribute, dependency) in entries {
                    let Json::String(dependency) = dependency else {
                        return Err(Error::validation(format!(
                            "dependency map value for '{attribute}' must be a string, got {}",
                            json_kind(dependency)
                        )));
                    };
                    declaration
                        .map
                        .insert(attribute.clone(), dependency.clone());
                }
            }
            Some(other) => {
                return Err(Error::validation(format!(
                    "dependency map must be an object, got {}",
                    json_kind(other)
                )));
            }
        }

        Ok(declaration)
    }

    /// Whether neither form declares anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty() && self.map.is_empty()
    }

    /// Merge both forms into one request.
    ///
    /// # Errors
    /// `Validation` for empty names, or for overlapping attributes under
    /// [`OverlapPolicy::Reject`].
    pub fn to_request(&self, overlap: OverlapPolicy) -> Result<DependencyRequest> {
        let mut bindings: IndexMap<String, String> = IndexMap::new();

        for (attribute, dependency) in &self.list {
            check_name("attribute", attribute)?;
            check_name("dependency", dependency)?;
            bindings.insert(attribute.clone(), dependency.clone());
        }

        for (attribute, dependency) in &self.map {
            check_name("attribute", attribute)?;
            check_name("dependency", dependency)?;
            if let Some(previous) = bindings.get(attribute) {
                match overlap {
                    OverlapPolicy::Warn => tracing::warn!(
                        attribute = %attribute,
                        list = %previous,
                        map = %dependency,
                        "Attribute declared in both dependency forms; map entry wins"
                    ),
                    OverlapPolicy::Reject => {
                        return Err(Error::validation(format!(
                            "attribute '{attribute}' is declared in both the list and the map"
                        )));
                    }
                }
            }
            bindings.insert(attribute.clone(), dependency.clone());
        }

        Ok(DependencyRequest::new(bindings))
    }
}

fn list_entry(entry: &Json) -> Result<(String, String)> {
    match entry {
        Json::String(name) => Ok((name.clone(), name.clone())),
        Json::Array(pair) => match pair.as_slice() {
            [Json::String(attribute), Json::String(dependency)] => {
                Ok((attribute.clone(), dependency.clone()))
            }
            _ => Err(Error::validation(
                "dependency list pairs must be [attribute, dependency] strings",
            )),
        },
        other => Err(Error::validation(format!(
            "dependency list entries must be names or pairs, got {}",
            json_kind(other)
        ))),
    }
}

fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation(format!("{kind} name must not be empty")));
    }
    Ok(())
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

/// Aggregate request: every `attribute -> dependency` binding of one target,
/// resolved with a single resolver call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyRequest {
    bindings: IndexMap<String, String>,
}

impl DependencyRequest {
    fn new(bindings: IndexMap<String, String>) -> Self {
        Self { bindings }
    }

    /// `(attribute, dependency)` bindings in declaration order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(attribute, dependency)| (attribute.as_str(), dependency.as_str()))
    }

    /// The dependency bound to `attribute`.
    #[must_use]
    pub fn dependency_for(&self, attribute: &str) -> Option<&str> {
        self.bindings.get(attribute).map(String::as_str)
    }

    /// Distinct dependency names, in first-use order.
    #[must_use]
    pub fn dependency_names(&self) -> Vec<String> {
        self.bindings
            .values()
            .cloned()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
