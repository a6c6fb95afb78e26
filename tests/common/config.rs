//! Test configuration builders

use archive_organizer::{Config, ReadinessConfig};
use std::path::Path;
use std::time::Duration;

/// Readiness settings fast enough for tests: 50ms ticks, no grace delay, two stable ticks
pub fn fast_readiness() -> ReadinessConfig {
    ReadinessConfig {
        poll_interval: Duration::from_millis(50),
        min_grace_delay: Duration::ZERO,
        stability_threshold: 2,
        max_wait: Duration::from_secs(30),
    }
}

/// Full configuration for `root` with fast readiness
pub fn fast_config(root: &Path) -> Config {
    let mut config = Config::for_root(root);
    config.readiness = fast_readiness();
    config
}
