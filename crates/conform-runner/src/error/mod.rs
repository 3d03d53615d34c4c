//! Domain errors raised while resolving and running formatters.
//!
//! The taxonomy mirrors the three places a pipeline can stop: a formatter
//! cannot be resolved for the current context ([`ResolutionError`]), its
//! process misbehaves ([`ExecutionError`]), or the pipeline as a whole has
//! nothing to do or was abandoned ([`PipelineError`]). I/O errors are wrapped
//! in `Arc` so every error stays `Clone` and can cross the async callback
//! boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Reasons a formatter could not be turned into a runnable process.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// The command could not be located on `PATH` or on disk.
    #[error("formatter '{name}' is unavailable: command '{command}' not found")]
    CommandNotFound {
        /// Formatter name.
        name: String,
        /// Command that was looked up.
        command: String,
    },

    /// The applicability condition evaluated to false.
    #[error("formatter '{name}' is unavailable: condition failed")]
    ConditionFailed {
        /// Formatter name.
        name: String,
    },

    /// The formatter requires a working directory and none was resolved.
    #[error("formatter '{name}' is unavailable: no working directory could be resolved")]
    CwdMissing {
        /// Formatter name.
        name: String,
    },
}

impl ResolutionError {
    /// Name of the formatter that failed to resolve.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::CommandNotFound { name, .. }
            | Self::ConditionFailed { name }
            | Self::CwdMissing { name } => name,
        }
    }
}

/// Failures raised while a formatter process runs.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// The process could not be started.
    #[error("formatter '{name}' failed to start: {source}")]
    Spawn {
        /// Formatter name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The process exited with a code outside the configured success set.
    #[error("formatter '{name}' exited with {}: {stderr}", describe_code(.code))]
    ExitCode {
        /// Formatter name.
        name: String,
        /// Exit code, or `None` when the process was terminated by a signal.
        code: Option<i32>,
        /// Captured standard error, or a generic message when it was empty.
        stderr: String,
    },

    /// The process exited before it consumed its standard input.
    #[error("formatter '{name}' exited before consuming its input ({})", describe_code(.code))]
    EarlyExit {
        /// Formatter name.
        name: String,
        /// Exit code reported by the process.
        code: Option<i32>,
    },

    /// The process was still running when the deadline passed.
    #[error("formatter '{name}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Formatter name.
        name: String,
        /// Budget the process exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// The run was abandoned and the process was killed.
    #[error("formatter '{name}' was cancelled")]
    Cancelled {
        /// Formatter name.
        name: String,
    },

    /// The process wrote output that is not valid UTF-8.
    #[error("formatter '{name}' wrote invalid output: {message}")]
    InvalidOutput {
        /// Formatter name.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// A temporary input file could not be prepared or read back.
    #[error("formatter '{name}' could not use temporary file {path}: {source}")]
    TempFile {
        /// Formatter name.
        name: String,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// An I/O error occurred while talking to the process.
    #[error("I/O error communicating with formatter '{name}': {source}")]
    Io {
        /// Formatter name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(
        || String::from("no exit code (terminated by signal)"),
        |value| format!("code {value}"),
    )
}

impl ExecutionError {
    /// Name of the formatter whose process failed.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Spawn { name, .. }
            | Self::ExitCode { name, .. }
            | Self::EarlyExit { name, .. }
            | Self::Timeout { name, .. }
            | Self::Cancelled { name }
            | Self::InvalidOutput { name, .. }
            | Self::TempFile { name, .. }
            | Self::Io { name, .. } => name,
        }
    }

    /// Returns true when the deadline passed while the process still ran.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true when the run was abandoned.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Errors surfaced through a [`PipelineResult`](crate::PipelineResult).
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The request named no formatters.
    #[error("no formatters available")]
    NoFormatters,

    /// A formatter could not be resolved; later stages were not run.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A formatter process failed; later stages were not run.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// The run was abandoned before it completed.
    #[error("pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> PipelineErrorKind {
        match self {
            Self::NoFormatters => PipelineErrorKind::NoFormatters,
            Self::Resolution(_) => PipelineErrorKind::Resolution,
            Self::Execution(ExecutionError::Timeout { .. }) => PipelineErrorKind::Timeout,
            Self::Execution(ExecutionError::Cancelled { .. }) | Self::Cancelled => {
                PipelineErrorKind::Cancelled
            }
            Self::Execution(_) => PipelineErrorKind::Execution,
        }
    }
}

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineErrorKind {
    /// Nothing was configured or available.
    NoFormatters,
    /// A formatter was unavailable for the context.
    Resolution,
    /// A formatter process failed.
    Execution,
    /// A synchronous run exceeded its timeout.
    Timeout,
    /// The run was abandoned.
    Cancelled,
}
