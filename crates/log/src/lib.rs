//! # Keel Log
//!
//! Logging bootstrap for Keel binaries and tests.
//!
//! ## Quick Start
//!
//! ```no_run
//! fn main() -> keel_log::Result<()> {
//!     let _guard = keel_log::auto_init()?;
//!
//!     keel_log::info!(port = 8080, "Server starting");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod builder;
mod config;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Fields, Format, Writer};

pub use tracing::{debug, error, info, instrument, span, trace, warn};

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for logger operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filter directives could not be parsed
    #[error("Invalid filter '{filter}': {reason}")]
    Filter {
        /// The rejected directives
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("Logger already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Auto-detect and initialize the best logging configuration
///
/// Environment configuration when `KEEL_LOG` or `RUST_LOG` is set, otherwise
/// [`Config::development`] in debug builds and [`Config::production`] in
/// release builds.
pub fn auto_init() -> Result<LoggerGuard> {
    if std::env::var_os("KEEL_LOG").is_some() || std::env::var_os("RUST_LOG").is_some() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with default configuration
pub fn init() -> Result<LoggerGuard> {
    init_with(Config::default())
}

/// Initialize with custom configuration
pub fn init_with(config: Config) -> Result<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Initialize for tests; output goes through the harness capture
///
/// Safe to call from every test: once a subscriber is installed further calls
/// return a no-op guard.
pub fn try_init_test() -> Result<LoggerGuard> {
    if tracing::dispatcher::has_been_set() {
        return Ok(LoggerGuard::noop());
    }
    match init_with(Config::test()) {
        Err(Error::AlreadyInitialized(_)) => Ok(LoggerGuard::noop()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        let _first = try_init_test().unwrap();
        let _second = try_init_test().unwrap();
        info!(component = "log", "captured by the harness");
    }

    #[test]
    fn filter_error_message() {
        let err = Error::Filter {
            filter: "x=loud".into(),
            reason: "invalid level".into(),
        };
        assert_eq!(err.to_string(), "Invalid filter 'x=loud': invalid level");
    }
}
