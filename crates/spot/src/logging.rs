//! Log output for scenarios.
//!
//! Library code only emits `tracing` events; test binaries call
//! [`init_logging`] once to see them.

use crate::config::ScenarioConfig;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber for the scenario.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` when the scenario
/// runs in debug mode and `info` otherwise. Returns `false` when a global
/// subscriber was already installed.
pub fn init_logging(config: &ScenarioConfig) -> bool {
    let default_level = default_level(config);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_test_writer()
        .try_init()
        .is_ok()
}

const fn default_level(config: &ScenarioConfig) -> &'static str {
    if config.debug {
        "spot_web=debug,info"
    } else {
        "info"
    }
}

/// Render a duration the way wait logs print it (`1.250s`, `80ms`)
#[must_use]
pub fn elapsed_label(elapsed: Duration) -> String {
    if elapsed.as_secs() > 0 {
        format!("{}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}
