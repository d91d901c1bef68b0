//! Type-erased provider values and resolved argument sets

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A resolved provider value.
///
/// Values are shared, never copied: every consumer of a provider within one
/// session holds a clone of the same `Arc`.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value as a [`Value`].
pub fn value<T: Any + Send + Sync>(inner: T) -> Value {
    Arc::new(inner)
}

/// Downcast a [`Value`] to a concrete type, keeping it shared.
pub fn downcast<T: Any + Send + Sync>(name: &str, value: &Value) -> Result<Arc<T>> {
    Arc::clone(value)
        .downcast::<T>()
        .map_err(|_| Error::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

/// Outcome of resolving one dependency name.
///
/// `NotFound` is the "no provider registered" marker. It lives outside the
/// value domain, so no provider output (unit, `None`, empty collections) can
/// ever be mistaken for it.
#[derive(Clone)]
pub enum Resolution {
    /// The provider produced this value.
    Found(Value),
    /// No provider is registered under the requested name.
    NotFound,
}

impl Resolution {
    /// Returns `true` for [`Resolution::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Borrow the resolved value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found(_) => f.write_str("Found(..)"),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Resolved values keyed by dependency name, in request order.
///
/// Handed to provider factories (every entry is `Found`) and to consumers
/// (entries may be `NotFound`).
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: IndexMap<String, Resolution>,
}

impl Arguments {
    /// Create an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, resolution: Resolution) {
        self.values.insert(name.into(), resolution);
    }

    /// Get a resolved value by name, downcast to `T`.
    ///
    /// # Errors
    /// `MissingDependency` if the name was not requested or has no provider,
    /// `TypeMismatch` if the value is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        match self.values.get(name) {
            Some(Resolution::Found(value)) => downcast(name, value),
            Some(Resolution::NotFound) | None => Err(Error::missing(name)),
        }
    }

    /// Like [`get`](Self::get), but `Ok(None)` when there is no provider.
    pub fn try_get<T: Any + Send + Sync>(&self, name: &str) -> Result<Option<Arc<T>>> {
        match self.values.get(name) {
            Some(Resolution::Found(value)) => downcast(name, value).map(Some),
            Some(Resolution::NotFound) | None => Ok(None),
        }
    }

    /// Get the raw resolution for a name.
    #[must_use]
    pub fn resolution(&self, name: &str) -> Option<&Resolution> {
        self.values.get(name)
    }

    /// Get the untyped value for a name.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name).and_then(Resolution::value)
    }

    /// Requested names, in request order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the argument set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access_shares_the_value() {
        let shared = value(String::from("Foo"));
        let mut args = Arguments::new();
        args.insert("foo", Resolution::Found(Arc::clone(&shared)));

        let a = args.get::<String>("foo").unwrap();
        let b = args.get::<String>("foo").unwrap();
        assert_eq!(a.as_str(), "Foo");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn not_found_is_distinct_from_unit_and_none() {
        let mut args = Arguments::new();
        args.insert("unit", Resolution::Found(value(())));
        args.insert("none", Resolution::Found(value(None::<u8>)));
        args.insert("missing", Resolution::NotFound);

        assert!(args.try_get::<()>("unit").unwrap().is_some());
        assert!(args.try_get::<Option<u8>>("none").unwrap().is_some());
        assert!(args.try_get::<u8>("missing").unwrap().is_none());
        assert!(args.resolution("missing").unwrap().is_not_found());
        assert!(matches!(
            args.get::<u8>("missing"),
            Err(Error::MissingDependency { .. })
        ));
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut args = Arguments::new();
        args.insert("n", Resolution::Found(value(7u32)));
        let err = args.get::<String>("n").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref name, .. } if name == "n"));
    }

    #[test]
    fn names_keep_request_order() {
        let mut args = Arguments::new();
        args.insert("b", Resolution::NotFound);
        args.insert("a", Resolution::NotFound);
        assert_eq!(args.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(args.len(), 2);
    }
}
