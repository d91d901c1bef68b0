//! Engine configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What to do when the list and map forms of a declaration bind the same
/// attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Keep the map entry and log a warning.
    #[default]
    Warn,
    /// Reject the declaration with a validation error.
    Reject,
}

/// Engine configuration.
///
/// ```toml
/// teardown_timeout_ms = 5000
/// overlap = "warn"
/// concurrent_resolution = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound for each teardown action; `None` waits indefinitely.
    pub teardown_timeout_ms: Option<u64>,
    /// Declaration overlap handling.
    pub overlap: OverlapPolicy,
    /// Resolve sibling dependencies concurrently instead of one by one.
    pub concurrent_resolution: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            teardown_timeout_ms: None,
            overlap: OverlapPolicy::Warn,
            concurrent_resolution: true,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Configuration {
            message: "invalid TOML".to_string(),
            source: Some(Box::new(e)),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Configuration {
            message: format!("cannot read {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by `KEEL_TEARDOWN_TIMEOUT_MS`, `KEEL_OVERLAP`
    /// and `KEEL_CONCURRENT_RESOLUTION`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("KEEL_TEARDOWN_TIMEOUT_MS") {
            let ms = raw.trim().parse::<u64>().map_err(|e| Error::Configuration {
                message: format!("KEEL_TEARDOWN_TIMEOUT_MS={raw} is not a number"),
                source: Some(Box::new(e)),
            })?;
            config.teardown_timeout_ms = Some(ms);
        }
        if let Ok(raw) = std::env::var("KEEL_OVERLAP") {
            config.overlap = match raw.to_lowercase().as_str() {
                "warn" => OverlapPolicy::Warn,
                "reject" => OverlapPolicy::Reject,
                other => {
                    return Err(Error::configuration(format!(
                        "KEEL_OVERLAP must be 'warn' or 'reject', got '{other}'"
                    )));
                }
            };
        }
        if let Ok(raw) = std::env::var("KEEL_CONCURRENT_RESOLUTION") {
            config.concurrent_resolution = raw != "0" && raw != "false";
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.teardown_timeout_ms == Some(0) {
            return Err(Error::configuration(
                "teardown_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Per-teardown timeout as a [`Duration`].
    #[must_use]
    pub fn teardown_timeout(&self) -> Option<Duration> {
        self.teardown_timeout_ms.map(Duration::from_millis)
    }

    /// Set the per-teardown timeout.
    #[must_use]
    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the overlap policy.
    #[must_use]
    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Resolve siblings sequentially, in declaration order.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.concurrent_resolution = false;
        self
    }
}
