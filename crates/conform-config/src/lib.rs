//! Shared runtime configuration for the Conform formatter pipeline.
//!
//! Configuration is layered through `ortho_config`: built-in defaults are
//! overridden by a `conform.toml` file, then by `CONFORM_*` environment
//! variables, and finally by command-line style flags supplied by the host
//! editor. The resulting [`Config`] only covers the ambient concerns of the
//! runner (timeouts, logging, early-exit classification); formatter tables
//! are owned by the caller.

mod defaults;
mod logging;
mod policy;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TIMEOUT_MS, default_early_exit, default_log_filter,
    default_log_filter_string, default_log_format, default_timeout, default_timeout_ms,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use policy::{EarlyExitPolicy, EarlyExitPolicyParseError};

/// Runtime configuration shared by the runner and the session facade.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CONFORM")]
pub struct Config {
    /// Tracing filter expression (`EnvFilter` syntax).
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log records.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Synchronous formatting timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    #[ortho_config(default = default_timeout_ms())]
    pub timeout_ms: u64,
    /// Classification applied to processes that exit before reading input.
    #[serde(default = "default_early_exit")]
    #[ortho_config(default = default_early_exit())]
    pub early_exit: EarlyExitPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            timeout_ms: default_timeout_ms(),
            early_exit: default_early_exit(),
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Synchronous formatting timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Early-exit classification policy.
    #[must_use]
    pub const fn early_exit(&self) -> EarlyExitPolicy {
        self.early_exit
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.timeout(), Duration::from_millis(1000));
        assert_eq!(config.early_exit(), EarlyExitPolicy::Error);
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("COMPACT", LogFormat::Compact)]
    fn log_format_parses_case_insensitively(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(LogFormat::from_str(input).expect("parse"), expected);
    }

    #[rstest]
    #[case("error", EarlyExitPolicy::Error)]
    #[case("Tolerate", EarlyExitPolicy::Tolerate)]
    fn early_exit_parses_case_insensitively(
        #[case] input: &str,
        #[case] expected: EarlyExitPolicy,
    ) {
        assert_eq!(EarlyExitPolicy::from_str(input).expect("parse"), expected);
    }

    #[test]
    fn unknown_early_exit_policy_is_rejected() {
        assert!(EarlyExitPolicy::from_str("retry").is_err());
    }

    #[test]
    fn policy_displays_snake_case() {
        assert_eq!(EarlyExitPolicy::Tolerate.to_string(), "tolerate");
    }
}
