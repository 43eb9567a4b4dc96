//! Wait Mechanisms
//!
//! Every wrapper operation that depends on the page reaching some state goes
//! through a [`Waiter`]: the condition is polled at a fixed interval until it
//! holds or the timeout expires.
//!
//! Conditions are fallible. Transient driver failures (stale handles, nodes
//! not found yet) count as "not yet" and keep the loop going; anything else
//! aborts the wait immediately.

use crate::config::{ScenarioConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use crate::logging::elapsed_label;
use crate::result::{SpotError, SpotResult};
use std::time::{Duration, Instant};

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options using the scenario's main timeout
    #[must_use]
    pub const fn from_config(config: &ScenarioConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            poll_interval_ms: config.poll_interval_ms,
        }
    }

    /// Options using the scenario's short timeout
    #[must_use]
    pub const fn short(config: &ScenarioConfig) -> Self {
        Self {
            timeout_ms: config.short_timeout_ms,
            poll_interval_ms: config.poll_interval_ms,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Outcome of a successful wait
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

impl WaitResult {
    /// Create a wait result
    #[must_use]
    pub fn new(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            elapsed,
            waited_for: waited_for.into(),
        }
    }
}

// =============================================================================
// WAITER
// =============================================================================

/// Polling loop bound to one set of [`WaitOptions`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Waiter {
    options: WaitOptions,
}

impl Waiter {
    /// Create a waiter
    #[must_use]
    pub const fn new(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Options in use
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Poll `condition` until it yields a value.
    ///
    /// The condition runs at least once, even with a zero timeout. Retryable
    /// errors are swallowed; the last one is reported in the timeout error.
    pub fn until<T, F>(&self, description: &str, mut condition: F) -> SpotResult<T>
    where
        F: FnMut() -> SpotResult<Option<T>>,
    {
        let start = Instant::now();
        let timeout = self.options.timeout();
        let mut last_error: Option<SpotError> = None;

        loop {
            match condition() {
                Ok(Some(value)) => {
                    tracing::trace!(
                        waited_for = description,
                        elapsed = %elapsed_label(start.elapsed()),
                        "wait satisfied"
                    );
                    return Ok(value);
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break;
            }
            std::thread::sleep(self.options.poll_interval().min(timeout - elapsed));
        }

        let waited_for = match last_error {
            Some(e) => format!("{description} (last error: {e})"),
            None => description.to_string(),
        };
        tracing::debug!(
            timeout_ms = self.options.timeout_ms,
            %waited_for,
            "wait timed out"
        );
        Err(SpotError::Timeout {
            ms: self.options.timeout_ms,
            waited_for,
        })
    }

    /// Poll until `condition` returns `true`
    pub fn until_true<F>(&self, description: &str, mut condition: F) -> SpotResult<WaitResult>
    where
        F: FnMut() -> SpotResult<bool>,
    {
        let start = Instant::now();
        self.until(description, || Ok(condition()?.then_some(())))?;
        Ok(WaitResult::new(start.elapsed(), description))
    }

    /// Poll while `condition` keeps returning `true`
    pub fn wait_while<F>(&self, description: &str, mut condition: F) -> SpotResult<WaitResult>
    where
        F: FnMut() -> SpotResult<bool>,
    {
        self.until_true(description, || Ok(!condition()?))
    }
}
