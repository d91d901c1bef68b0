//! Injection targets.
//!
//! The injector never inspects a target's fields directly. A target reports
//! the [`AttributeState`] of each attribute it knows and accepts values by
//! name. [`Slot`] covers statically typed fields, [`Attributes`] covers
//! records whose attributes are only known at runtime.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::value::{Value, downcast};

/// Where an attribute's current value came from, ignoring injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeState {
    /// No value and no default.
    Absent,
    /// A default value that injection may replace.
    Default,
    /// A value supplied at construction; injection never touches it.
    Explicit,
}

/// Something dependencies can be injected into.
pub trait Target: Send {
    /// State of `attribute`.
    ///
    /// # Errors
    /// `UnknownAttribute` if the target has no such attribute.
    fn attribute_state(&self, attribute: &str) -> Result<AttributeState>;

    /// Assign a resolved value to `attribute`.
    ///
    /// # Errors
    /// `UnknownAttribute` or `TypeMismatch`.
    fn inject(&mut self, attribute: &str, value: Value) -> Result<()>;
}

/// A typed injectable field.
///
/// ```
/// use keel_inject::{AttributeState, Slot};
///
/// let mut port: Slot<u16> = Slot::with_default(8080);
/// assert_eq!(port.state(), AttributeState::Default);
///
/// port.set(9000);
/// assert_eq!(port.state(), AttributeState::Explicit);
/// assert_eq!(*port.get().unwrap().as_ref(), 9000);
/// ```
pub struct Slot<T> {
    value: Option<Arc<T>>,
    state: AttributeState,
    injected: bool,
}

impl<T: Any + Send + Sync> Slot<T> {
    /// Empty slot without a default.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            value: None,
            state: AttributeState::Absent,
            injected: false,
        }
    }

    /// Slot holding a default.
    pub fn with_default(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
            state: AttributeState::Default,
            injected: false,
        }
    }

    /// Slot holding a constructor-supplied value.
    pub fn explicit(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
            state: AttributeState::Explicit,
            injected: false,
        }
    }

    /// Set the value explicitly.
    pub fn set(&mut self, value: T) {
        self.value = Some(Arc::new(value));
        self.state = AttributeState::Explicit;
        self.injected = false;
    }

    #[must_use]
    pub fn state(&self) -> AttributeState {
        self.state
    }

    /// Current value, whatever its origin.
    #[must_use]
    pub fn get(&self) -> Option<&Arc<T>> {
        self.value.as_ref()
    }

    /// Whether the current value was injected.
    #[must_use]
    pub fn is_injected(&self) -> bool {
        self.injected
    }

    /// Assign an untyped injected value.
    ///
    /// # Errors
    /// `TypeMismatch` if `value` is not a `T`; the slot is unchanged.
    pub fn assign(&mut self, attribute: &str, value: &Value) -> Result<()> {
        self.value = Some(downcast::<T>(attribute, value)?);
        self.injected = true;
        Ok(())
    }
}

impl<T: Any + Send + Sync> Default for Slot<T> {
    fn default() -> Self {
        Self::absent()
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("value", &self.value)
            .field("state", &self.state)
            .field("injected", &self.injected)
            .finish()
    }
}

#[derive(Clone)]
struct Entry {
    state: AttributeState,
    value: Option<Value>,
    injected: bool,
}

/// Attribute record whose names are known only at runtime.
///
/// Unknown attributes are rejected, so declarations must name attributes the
/// record was built with.
#[derive(Clone, Default)]
pub struct Attributes {
    entries: IndexMap<String, Entry>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute with no value and no default.
    #[must_use]
    pub fn declare(mut self, attribute: impl Into<String>) -> Self {
        self.entries.insert(
            attribute.into(),
            Entry {
                state: AttributeState::Absent,
                value: None,
                injected: false,
            },
        );
        self
    }

    /// Declare an attribute with a default.
    #[must_use]
    pub fn with_default<T: Any + Send + Sync>(
        mut self,
        attribute: impl Into<String>,
        value: T,
    ) -> Self {
        self.entries.insert(
            attribute.into(),
            Entry {
                state: AttributeState::Default,
                value: Some(Arc::new(value)),
                injected: false,
            },
        );
        self
    }

    /// Set an attribute explicitly, declaring it if needed.
    #[must_use]
    pub fn with_explicit<T: Any + Send + Sync>(
        mut self,
        attribute: impl Into<String>,
        value: T,
    ) -> Self {
        self.set(attribute, value);
        self
    }

    /// Set an attribute explicitly, declaring it if needed.
    pub fn set<T: Any + Send + Sync>(&mut self, attribute: impl Into<String>, value: T) {
        self.entries.insert(
            attribute.into(),
            Entry {
                state: AttributeState::Explicit,
                value: Some(Arc::new(value)),
                injected: false,
            },
        );
    }

    /// Typed value of an attribute, `Ok(None)` if it has no value.
    ///
    /// # Errors
    /// `UnknownAttribute` or `TypeMismatch`.
    pub fn get<T: Any + Send + Sync>(&self, attribute: &str) -> Result<Option<Arc<T>>> {
        match self.entry(attribute)?.value.as_ref() {
            Some(value) => downcast(attribute, value).map(Some),
            None => Ok(None),
        }
    }

    /// Untyped value of an attribute.
    #[must_use]
    pub fn raw(&self, attribute: &str) -> Option<&Value> {
        self.entries.get(attribute).and_then(|entry| entry.value.as_ref())
    }

    /// Whether the attribute currently holds an injected value.
    #[must_use]
    pub fn is_injected(&self, attribute: &str) -> bool {
        self.entries
            .get(attribute)
            .is_some_and(|entry| entry.injected)
    }

    /// Attribute names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn entry(&self, attribute: &str) -> Result<&Entry> {
        self.entries
            .get(attribute)
            .ok_or_else(|| Error::UnknownAttribute {
                attribute: attribute.to_string(),
            })
    }
}

impl Target for Attributes {
    fn attribute_state(&self, attribute: &str) -> Result<AttributeState> {
        self.entry(attribute).map(|entry| entry.state)
    }

    fn inject(&mut self, attribute: &str, value: Value) -> Result<()> {
        let entry = self
            .entries
            .get_mut(attribute)
            .ok_or_else(|| Error::UnknownAttribute {
                attribute: attribute.to_string(),
            })?;
        entry.value = Some(value);
        entry.injected = true;
        Ok(())
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, entry) in &self.entries {
            map.entry(name, &(entry.state, entry.injected));
        }
        map.finish()
    }
}
