//! Error types for provider registration, resolution and injection
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by provider factories and teardown actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single teardown action that failed during session exit.
#[derive(Debug)]
pub struct TeardownFailure {
    /// Name of the provider whose teardown failed.
    pub provider: String,
    /// Human-readable failure reason.
    pub reason: String,
    /// The underlying error, if the teardown returned one.
    pub source: Option<BoxError>,
}

impl std::fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}': {}", self.provider, self.reason)
    }
}

/// Comprehensive error type for the dependency engine
#[derive(Error, Debug)]
pub enum Error {
    /// Registration attempted after the registry was frozen
    #[error("Cannot register provider '{provider}': registry is frozen")]
    FrozenRegistry {
        /// The provider that could not be registered
        provider: String,
    },

    /// A session was requested before the registry was frozen
    #[error("Registry must be frozen before a session can be entered")]
    NotFrozen,

    /// A second session was opened while one is still active
    #[error("Session '{session_id}' is still open")]
    SessionAlreadyOpen {
        /// Identifier of the session that is still open
        session_id: String,
    },

    /// Exit requested with no open session
    #[error("No session is currently open")]
    NoActiveSession,

    /// Resolution attempted on a session that has already exited
    #[error("Session '{session_id}' is closed")]
    SessionClosed {
        /// Identifier of the closed session
        session_id: String,
    },

    /// Malformed dependency declaration
    #[error("Invalid dependency declaration: {message}")]
    Validation {
        /// What was wrong with the declaration
        message: String,
    },

    /// A dependency has no provider and nothing to fall back on
    #[error("Required dependency '{dependency}' was not found{}", required_by_suffix(.required_by.as_deref()))]
    MissingDependency {
        /// The dependency name
        dependency: String,
        /// The provider that requires it, when the request came from a provider
        required_by: Option<String>,
    },

    /// The provider graph contains a cycle
    #[error("Circular dependency detected: {cycle}")]
    CyclicDependency {
        /// The dependency cycle as a string
        cycle: String,
    },

    /// A provider factory returned an error
    #[error("Provider '{provider}' failed: {source}")]
    ProviderFailed {
        /// The provider name
        provider: String,
        /// The underlying error
        #[source]
        source: BoxError,
    },

    /// A value was requested or assigned with the wrong type
    #[error("Type mismatch for '{name}': expected {expected}")]
    TypeMismatch {
        /// Dependency or attribute name
        name: String,
        /// The expected Rust type
        expected: &'static str,
    },

    /// The target has no attribute with this name
    #[error("Target has no attribute '{attribute}'")]
    UnknownAttribute {
        /// The attribute name
        attribute: String,
    },

    /// One or more teardown actions failed during session exit
    #[error("{} teardown action(s) failed: {}", .failures.len(), join_failures(.failures))]
    Teardown {
        /// Every failure, in the order the teardowns ran
        failures: Vec<TeardownFailure>,
    },

    /// Engine configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },
}

fn required_by_suffix(required_by: Option<&str>) -> String {
    required_by.map_or_else(String::new, |p| format!(" (required by '{p}')"))
}

fn join_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a missing-dependency error for a top-level request
    pub fn missing<S: Into<String>>(dependency: S) -> Self {
        Self::MissingDependency {
            dependency: dependency.into(),
            required_by: None,
        }
    }

    /// Whether a host should abort its startup sequence on this error.
    #[must_use]
    pub fn is_startup_fatal(&self) -> bool {
        !matches!(self, Self::Teardown { .. })
    }

    /// Get the provider or dependency name associated with this error (if any)
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::FrozenRegistry { provider } | Self::ProviderFailed { provider, .. } => {
                Some(provider)
            }
            Self::MissingDependency { dependency, .. } => Some(dependency),
            Self::TypeMismatch { name, .. } => Some(name),
            Self::NotFrozen
            | Self::SessionAlreadyOpen { .. }
            | Self::NoActiveSession
            | Self::SessionClosed { .. }
            | Self::Validation { .. }
            | Self::CyclicDependency { .. }
            | Self::UnknownAttribute { .. }
            | Self::Teardown { .. }
            | Self::Configuration { .. } => None,
        }
    }
}
