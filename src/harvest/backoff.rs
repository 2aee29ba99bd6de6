//! Rate-limit backoff calculation

use crate::config::BackoffConfig;
use std::time::Duration;

/// Returns how long to wait after the `attempt`-th consecutive rate-limited
/// response (0-based).
///
/// With backoff disabled the wait is always `base_ms`. Otherwise it grows
/// linearly as `base + ratio * attempt * base` and is capped at `max_ms`.
pub fn rate_limit_delay(config: &BackoffConfig, attempt: u32) -> Duration {
    if !config.enabled {
        return Duration::from_millis(config.base_ms);
    }

    let grown = config
        .ratio
        .saturating_mul(u64::from(attempt))
        .saturating_mul(config.base_ms)
        .saturating_add(config.base_ms);

    Duration::from_millis(grown.min(config.max_ms))
}
