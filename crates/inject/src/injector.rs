//! Attribute injection policy.
//!
//! For every `attribute -> dependency` binding of a target:
//!
//! | attribute state | resolution | outcome |
//! |-----------------|------------|---------|
//! | `Explicit`      | any        | keep the constructed value |
//! | `Default`       | not found  | keep the default |
//! | `Absent`        | not found  | `MissingDependency` |
//! | otherwise       | found      | assign the resolved value |
//!
//! The plan is built for all bindings before anything is assigned, so a
//! missing dependency or unknown attribute leaves the target untouched.

use crate::config::OverlapPolicy;
use crate::declaration::Declaration;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::target::{AttributeState, Target};
use crate::value::{Resolution, Value};

/// What an injection did, per attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Attributes that received a resolved value.
    pub injected: Vec<String>,
    /// Attributes skipped because they were set at construction.
    pub kept_explicit: Vec<String>,
    /// Attributes that kept their default because no provider exists.
    pub kept_default: Vec<String>,
}

enum Step {
    Assign(Value),
    KeepExplicit,
    KeepDefault,
}

/// Applies the injection policy against one session.
#[derive(Debug, Clone, Copy, Default)]
pub struct Injector {
    overlap: OverlapPolicy,
}

impl Injector {
    #[must_use]
    pub fn new(overlap: OverlapPolicy) -> Self {
        Self { overlap }
    }

    /// Resolve `declaration` in `session` and inject the values into `target`.
    ///
    /// All dependencies are requested with a single resolver call.
    ///
    /// # Errors
    /// `Validation` for a malformed declaration, `MissingDependency` for an
    /// attribute with neither a provider nor a default, `UnknownAttribute`
    /// and `TypeMismatch` from the target, and any resolution error.
    pub async fn inject<T>(
        &self,
        session: &Session,
        target: &mut T,
        declaration: &Declaration,
    ) -> Result<InjectionReport>
    where
        T: Target + ?Sized,
    {
        let request = declaration.to_request(self.overlap)?;
        let mut report = InjectionReport::default();
        if request.is_empty() {
            return Ok(report);
        }

        let resolved = session.resolve(request.dependency_names()).await?;

        let mut plan = Vec::with_capacity(request.len());
        for (attribute, dependency) in request.bindings() {
            let state = target.attribute_state(attribute)?;
            let found = match resolved.resolution(dependency) {
                Some(Resolution::Found(value)) => Some(value),
                Some(Resolution::NotFound) | None => None,
            };

            let step = match (state, found) {
                (AttributeState::Explicit, _) => Step::KeepExplicit,
                (_, Some(value)) => Step::Assign(value.clone()),
                (AttributeState::Default, None) => Step::KeepDefault,
                (AttributeState::Absent, None) => {
                    return Err(Error::MissingDependency {
                        dependency: dependency.to_string(),
                        required_by: None,
                    });
                }
            };
            plan.push((attribute, step));
        }

        for (attribute, step) in plan {
            match step {
                Step::Assign(value) => {
                    target.inject(attribute, value)?;
                    report.injected.push(attribute.to_string());
                }
                Step::KeepExplicit => report.kept_explicit.push(attribute.to_string()),
                Step::KeepDefault => report.kept_default.push(attribute.to_string()),
            }
        }

        tracing::debug!(
            session = session.id(),
            injected = report.injected.len(),
            kept_explicit = report.kept_explicit.len(),
            kept_default = report.kept_default.len(),
            "Injected dependencies"
        );
        Ok(report)
    }
}
