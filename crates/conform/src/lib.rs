//! Formatting sessions for editor hosts.
//!
//! `conform` is the entry point a host embeds. It wires the formatter
//! pipeline from `conform-runner` to the document model of `conform-buffer`
//! and adds the pieces a host needs around them:
//!
//! - [`session`] runs requests synchronously or on a worker thread, keeps at
//!   most one run in flight per document, and reconciles the output,
//! - [`report`] classifies every failure with a severity and a stable code,
//! - [`telemetry`] installs the `tracing` subscriber.
//!
//! # Example
//!
//! ```rust,no_run
//! use conform::{FormatRequest, FormatSession, Report};
//! use conform_buffer::MemoryDocument;
//! use conform_config::Config;
//! use conform_runner::{DocumentId, FormatterSpec};
//!
//! let config = Config::default();
//! conform::telemetry::initialise(&config)?;
//! let session = FormatSession::from_config(&config);
//! let mut document = MemoryDocument::new(DocumentId::new(1), "x=1\n");
//! let request = FormatRequest::new(
//!     "/project/app.py",
//!     vec![FormatterSpec::new("black", "black").with_args(["--quiet", "-"])],
//! );
//! if let Err(error) = session.format(&mut document, &request) {
//!     let report = Report::from_error(&error);
//!     eprintln!("{}: {}", report.code(), report.summary());
//! }
//! # Ok::<(), conform::telemetry::TelemetryError>(())
//! ```

pub mod report;
pub mod session;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use self::report::{Classify, ErrorCode, Report, Severity};
pub use self::session::{FormatOutcome, FormatRequest, FormatSession, SessionError};
pub use self::telemetry::{TelemetryError, TelemetryHandle};
