//! Classification of failures for the host's notification layer.
//!
//! The formatter never talks to the user. Instead every error maps to a
//! [`Severity`] and a stable [`ErrorCode`], and a [`Report`] pairs a short
//! summary with the full detail so the host can decide what to surface.

use conform_buffer::BufferError;
use conform_runner::{ExecutionError, PipelineError, ResolutionError};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::session::SessionError;

/// How loudly a failure deserves to be reported.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    /// Expected outcome worth a log line at most.
    Info,
    /// Something was skipped or discarded.
    Warn,
    /// A formatter failed and the document was left untouched.
    Error,
}

/// Stable identifier of a failure class.
///
/// The string forms are part of the public interface and do not change
/// between releases.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    /// No formatter was configured or available.
    NoFormatters,
    /// A formatter's command could not be found.
    CommandNotFound,
    /// A formatter's applicability condition was false.
    ConditionFailed,
    /// A formatter required a working directory that could not be resolved.
    CwdMissing,
    /// A formatter process could not be started.
    SpawnFailed,
    /// A formatter exited with an unexpected code.
    ExitCode,
    /// A formatter exited before reading its input.
    EarlyExit,
    /// A synchronous run exceeded its timeout.
    Timeout,
    /// The run was abandoned.
    Cancelled,
    /// A formatter wrote output that is not UTF-8.
    InvalidOutput,
    /// A temporary input file could not be used.
    TempFile,
    /// Communication with a formatter process failed.
    Io,
    /// The document changed while formatting.
    ConcurrentModification,
    /// Computed edits could not be applied.
    InvalidEdit,
    /// A snapshot was applied to the wrong document.
    DocumentMismatch,
    /// The worker thread for an asynchronous run could not be started.
    WorkerUnavailable,
    /// The document lock was poisoned by a panicking writer.
    DocumentPoisoned,
}

impl ErrorCode {
    /// Stable string form, e.g. `exit_code`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Errors that carry a notification classification.
pub trait Classify {
    /// Stable code of the failure.
    fn code(&self) -> ErrorCode;

    /// Severity of the failure.
    fn severity(&self) -> Severity;
}

impl Classify for ResolutionError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::CommandNotFound { .. } => ErrorCode::CommandNotFound,
            Self::ConditionFailed { .. } => ErrorCode::ConditionFailed,
            Self::CwdMissing { .. } => ErrorCode::CwdMissing,
        }
    }

    fn severity(&self) -> Severity {
        Severity::Warn
    }
}

impl Classify for ExecutionError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Spawn { .. } => ErrorCode::SpawnFailed,
            Self::ExitCode { .. } => ErrorCode::ExitCode,
            Self::EarlyExit { .. } => ErrorCode::EarlyExit,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::InvalidOutput { .. } => ErrorCode::InvalidOutput,
            Self::TempFile { .. } => ErrorCode::TempFile,
            Self::Io { .. } => ErrorCode::Io,
        }
    }

    fn severity(&self) -> Severity {
        if self.is_cancelled() {
            Severity::Info
        } else {
            Severity::Error
        }
    }
}

impl Classify for PipelineError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::NoFormatters => ErrorCode::NoFormatters,
            Self::Resolution(err) => err.code(),
            Self::Execution(err) => err.code(),
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::NoFormatters => Severity::Warn,
            Self::Resolution(err) => err.severity(),
            Self::Execution(err) => err.severity(),
            Self::Cancelled => Severity::Info,
        }
    }
}

impl Classify for BufferError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPosition { .. } | Self::OverlappingEdits { .. } => ErrorCode::InvalidEdit,
            Self::ConcurrentModification { .. } => ErrorCode::ConcurrentModification,
            Self::DocumentMismatch { .. } => ErrorCode::DocumentMismatch,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::ConcurrentModification { .. } => Severity::Warn,
            Self::InvalidPosition { .. }
            | Self::OverlappingEdits { .. }
            | Self::DocumentMismatch { .. } => Severity::Error,
        }
    }
}

impl Classify for SessionError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Pipeline(err) => err.code(),
            Self::Buffer(err) => err.code(),
            Self::Worker(_) => ErrorCode::WorkerUnavailable,
            Self::DocumentPoisoned(_) => ErrorCode::DocumentPoisoned,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::Pipeline(err) => err.severity(),
            Self::Buffer(err) => err.severity(),
            Self::Worker(_) | Self::DocumentPoisoned(_) => Severity::Error,
        }
    }
}

/// A classified failure ready for the host's notification layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    severity: Severity,
    code: ErrorCode,
    summary: String,
    detail: String,
}

impl Report {
    /// Builds a report for `error`.
    ///
    /// Process failures get a short summary pointing at the diagnostics,
    /// with the formatter's own message kept in [`Report::detail`]. Other
    /// failures are short enough to use their message as the summary.
    #[must_use]
    pub fn from_error<E>(error: &E) -> Self
    where
        E: Classify + std::error::Error,
    {
        let code = error.code();
        let detail = error.to_string();
        let summary = match code {
            ErrorCode::SpawnFailed
            | ErrorCode::ExitCode
            | ErrorCode::EarlyExit
            | ErrorCode::Timeout
            | ErrorCode::InvalidOutput
            | ErrorCode::TempFile
            | ErrorCode::Io => format!("formatting failed ({code}); see diagnostics for details"),
            _ => detail.clone(),
        };
        Self {
            severity: error.severity(),
            code,
            summary,
            detail,
        }
    }

    /// Severity of the failure.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Stable code of the failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// One-line message suitable for a notification.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Full error text, shown on demand.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns true when the host should notify the user.
    ///
    /// Availability failures only matter when the user asked for the
    /// formatter by name; during default discovery they are logged and
    /// skipped. Cancellations are never surfaced.
    #[must_use]
    pub const fn should_notify(&self, explicitly_requested: bool) -> bool {
        match self.code {
            ErrorCode::CommandNotFound | ErrorCode::ConditionFailed | ErrorCode::CwdMissing => {
                explicitly_requested
            }
            ErrorCode::Cancelled => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests;
