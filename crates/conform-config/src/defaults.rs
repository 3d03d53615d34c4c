use std::time::Duration;

use crate::logging::LogFormat;
use crate::policy::EarlyExitPolicy;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default synchronous formatting timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default synchronous timeout in milliseconds.
#[must_use]
pub const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Default synchronous timeout as a [`Duration`].
#[must_use]
pub const fn default_timeout() -> Duration {
    Duration::from_millis(DEFAULT_TIMEOUT_MS)
}

/// Default early-exit classification.
#[must_use]
pub const fn default_early_exit() -> EarlyExitPolicy {
    EarlyExitPolicy::Error
}
