//! Scenario configuration
//!
//! Timeouts, debug switch and free-form scenario parameters. Parameters are
//! looked up in the environment first, then in the loaded file.

use crate::result::{SpotError, SpotResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default timeout for element waits (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default short timeout (5 seconds)
pub const DEFAULT_SHORT_TIMEOUT_MS: u64 = 5_000;

/// Default page load timeout (60 seconds)
pub const DEFAULT_OPEN_PAGE_TIMEOUT_MS: u64 = 60_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Configuration shared by a scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Element wait timeout in milliseconds
    pub timeout_ms: u64,
    /// Short wait timeout in milliseconds
    pub short_timeout_ms: u64,
    /// Page load timeout in milliseconds
    pub open_page_timeout_ms: u64,
    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Verbose debug logging
    pub debug: bool,
    /// Base URL relative page urls are resolved against
    pub base_url: Option<String>,
    /// Free-form scenario parameters
    pub parameters: BTreeMap<String, String>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            short_timeout_ms: DEFAULT_SHORT_TIMEOUT_MS,
            open_page_timeout_ms: DEFAULT_OPEN_PAGE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            debug: false,
            base_url: None,
            parameters: BTreeMap::new(),
        }
    }
}

impl ScenarioConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> SpotResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> SpotResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "loading scenario config");
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> SpotResult<()> {
        if self.timeout_ms == 0 || self.short_timeout_ms == 0 || self.open_page_timeout_ms == 0 {
            return Err(SpotError::config("timeouts must be greater than zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(SpotError::config("poll interval must be greater than zero"));
        }
        Ok(())
    }

    /// Set element wait timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set short timeout
    #[must_use]
    pub const fn with_short_timeout(mut self, timeout_ms: u64) -> Self {
        self.short_timeout_ms = timeout_ms;
        self
    }

    /// Set page load timeout
    #[must_use]
    pub const fn with_open_page_timeout(mut self, timeout_ms: u64) -> Self {
        self.open_page_timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Enable debug logging
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a parameter
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.parameters.insert(name.into(), value.into());
        self
    }

    /// Element wait timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Short wait timeout
    #[must_use]
    pub const fn short_timeout(&self) -> Duration {
        Duration::from_millis(self.short_timeout_ms)
    }

    /// Page load timeout
    #[must_use]
    pub const fn open_page_timeout(&self) -> Duration {
        Duration::from_millis(self.open_page_timeout_ms)
    }

    /// Poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Look up a parameter: environment (`name`, then `NAME` with dots as
    /// underscores), then file parameters.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .or_else(|| std::env::var(env_key(name)).ok())
            .or_else(|| self.parameters.get(name).cloned())
    }

    /// Look up a parameter with a fallback value
    #[must_use]
    pub fn parameter_or(&self, name: &str, default: &str) -> String {
        self.parameter(name).unwrap_or_else(|| default.to_string())
    }

    /// Look up a mandatory parameter
    pub fn required_parameter(&self, name: &str) -> SpotResult<String> {
        self.parameter(name)
            .ok_or_else(|| SpotError::config(format!("missing parameter '{name}'")))
    }

    /// Look up an integer parameter
    pub fn int_parameter(&self, name: &str, default: i64) -> SpotResult<i64> {
        match self.parameter(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                SpotError::config(format!("parameter '{name}' is not an integer: {raw}"))
            }),
        }
    }

    /// Look up a boolean parameter (`true/false`, `yes/no`, `on/off`, `1/0`)
    pub fn bool_parameter(&self, name: &str, default: bool) -> SpotResult<bool> {
        match self.parameter(name) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(SpotError::config(format!(
                    "parameter '{name}' is not a boolean: {raw}"
                ))),
            },
        }
    }
}

fn env_key(name: &str) -> String {
    name.replace(['.', '-'], "_").to_ascii_uppercase()
}
