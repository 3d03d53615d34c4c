//! Formatter pipeline runner.
//!
//! The `conform-runner` crate turns formatter definitions into running
//! processes and composes their outputs. It covers four stages of a
//! formatting request:
//!
//! - the **context builder** ([`context`]) captures the document, its path
//!   and an optional range,
//! - the **config resolver** ([`resolver`]) evaluates every dynamic field of a
//!   [`FormatterSpec`] against that context,
//! - the **process executor** ([`process`]) runs one resolved formatter under
//!   a timeout or a cancellation token,
//! - the **pipeline composer** ([`pipeline`]) chains formatters in strict
//!   order and stops at the first failure.
//!
//! Converting the final text into document edits is the job of the
//! `conform-buffer` crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use conform_runner::{
//!     DocumentId, ExecutionContext, ExecutionMode, FormatterSpec, Pipeline, PipelineRequest,
//!     ProcessExecutor,
//! };
//!
//! let pipeline = Pipeline::with_process_executor(ProcessExecutor::default());
//! let request = PipelineRequest::new(
//!     ExecutionContext::new(DocumentId::new(1), "/project/app.py"),
//!     vec![FormatterSpec::new("black", "black").with_args(["--quiet", "-"])],
//!     ExecutionMode::Sync { timeout: Duration::from_secs(1) },
//! );
//! let result = pipeline.run(&request, "x=1\n");
//! assert!(result.output().is_some() || result.error().is_some());
//! ```

pub mod cancel;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod resolver;
pub mod spec;

#[cfg(test)]
mod tests;

pub use self::cancel::CancellationToken;
pub use self::context::{
    ContextBuilder, DocumentId, ExecutionContext, Position, Range, Selection, SelectionKind,
    find_root,
};
pub use self::error::{ExecutionError, PipelineError, PipelineErrorKind, ResolutionError};
pub use self::pipeline::{ExecutionMode, Pipeline, PipelineHandle, PipelineRequest, PipelineResult};
pub use self::process::{ExecLimits, FormatterExecutor, ProcessExecutor, ProcessOutput};
pub use self::registry::{Expansion, FormatterRegistry, RegistryError, Slot};
pub use self::resolver::ConfigResolver;
pub use self::spec::{Dynamic, FormatterSpec, InputMode, ResolvedFormatter, root_dir};
