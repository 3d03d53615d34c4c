//! Classification policy for formatter processes that exit early.
//!
//! A formatter may exit before it has read all of its standard input. Some
//! tools do this legitimately (they read the file from disk instead), while
//! for others it signals a crash. The policy decides which reading applies.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How to classify a process that exited before consuming its input.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EarlyExitPolicy {
    /// Treat the early exit as an execution error.
    #[default]
    Error,
    /// Ignore the unconsumed input and judge the run by its exit code alone.
    Tolerate,
}

/// Errors encountered while parsing an [`EarlyExitPolicy`] from text.
pub type EarlyExitPolicyParseError = strum::ParseError;
