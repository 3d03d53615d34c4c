//! Sequential composition of formatter stages.
//!
//! A [`Pipeline`] resolves and executes each formatter of a
//! [`PipelineRequest`] in list order, feeding every stage the output of the
//! previous one. The first failure stops the run: later stages are never
//! resolved or spawned. Runs can block the caller ([`Pipeline::run`]) under a
//! total deadline, or proceed on a worker thread ([`Pipeline::spawn`]) and
//! report through a callback, in which case the returned [`PipelineHandle`]
//! can abandon the run and kill its current process.

mod splice;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, PipelineError};
use crate::process::{ExecLimits, FormatterExecutor, ProcessExecutor};
use crate::resolver::ConfigResolver;
use crate::spec::FormatterSpec;
use splice::LineSpan;

/// Tracing target for pipeline composition.
const PIPELINE_TARGET: &str = "conform_runner::pipeline";

/// How a pipeline run waits for its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Block the caller; the whole run shares one deadline.
    Sync {
        /// Total time allowed for all stages.
        timeout: Duration,
    },
    /// Run without a deadline; the caller may cancel instead.
    Async,
}

/// One formatting request: where, what with, and how.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    context: ExecutionContext,
    formatters: Vec<FormatterSpec>,
    mode: ExecutionMode,
}

impl PipelineRequest {
    /// Creates a request running `formatters` in order over the document
    /// described by `context`.
    #[must_use]
    pub const fn new(
        context: ExecutionContext,
        formatters: Vec<FormatterSpec>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            context,
            formatters,
            mode,
        }
    }

    /// Execution context shared by every stage.
    #[must_use]
    pub const fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Ordered formatter list.
    #[must_use]
    pub fn formatters(&self) -> &[FormatterSpec] {
        &self.formatters
    }

    /// Execution mode.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

/// Outcome of one pipeline run.
///
/// Exactly one of `output` and `error` is populated. `attempted` lists the
/// formatters whose processes were started, in order.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    output: Option<String>,
    error: Option<PipelineError>,
    attempted: Vec<String>,
}

impl PipelineResult {
    const fn success(output: String, attempted: Vec<String>) -> Self {
        Self {
            output: Some(output),
            error: None,
            attempted,
        }
    }

    const fn failure(error: PipelineError, attempted: Vec<String>) -> Self {
        Self {
            output: None,
            error: Some(error),
            attempted,
        }
    }

    /// Final text when every stage succeeded.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Error that stopped the run.
    #[must_use]
    pub const fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    /// Formatters whose processes were started.
    #[must_use]
    pub fn attempted(&self) -> &[String] {
        &self.attempted
    }

    /// Returns true when every stage succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Converts the result into a standard `Result`.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error when the run did not complete.
    pub fn into_output(self) -> Result<String, PipelineError> {
        match (self.output, self.error) {
            (_, Some(error)) => Err(error),
            (Some(output), None) => Ok(output),
            (None, None) => Err(PipelineError::NoFormatters),
        }
    }
}

/// Resolves and runs formatter stages.
#[derive(Debug, Clone)]
pub struct Pipeline<E = ProcessExecutor> {
    resolver: ConfigResolver,
    executor: E,
}

impl Pipeline<ProcessExecutor> {
    /// Creates a pipeline that spawns real processes and inherits the
    /// current environment.
    #[must_use]
    pub fn with_process_executor(executor: ProcessExecutor) -> Self {
        Self::new(ConfigResolver::from_process_env(), executor)
    }
}

impl<E: FormatterExecutor> Pipeline<E> {
    /// Creates a pipeline from its collaborators.
    #[must_use]
    pub const fn new(resolver: ConfigResolver, executor: E) -> Self {
        Self { resolver, executor }
    }

    /// Resolver used for every stage.
    #[must_use]
    pub const fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Executor used for every stage.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Runs `request` over `text`, blocking until it completes.
    #[must_use]
    pub fn run(&self, request: &PipelineRequest, text: &str) -> PipelineResult {
        self.run_with_token(request, text, &CancellationToken::new())
    }

    /// Runs `request` over `text`, abandoning the run once `token` is
    /// cancelled.
    ///
    /// A cancelled run never carries output, even if the final stage had
    /// already finished.
    #[must_use]
    pub fn run_with_token(
        &self,
        request: &PipelineRequest,
        text: &str,
        token: &CancellationToken,
    ) -> PipelineResult {
        let context = request.context();
        let document = context.document();
        if request.formatters().is_empty() {
            debug!(target: PIPELINE_TARGET, %document, "no formatters requested");
            return PipelineResult::failure(PipelineError::NoFormatters, Vec::new());
        }

        let started = Instant::now();
        let mut current = text.to_owned();
        let mut attempted = Vec::with_capacity(request.formatters().len());

        for spec in request.formatters() {
            if token.is_cancelled() {
                debug!(target: PIPELINE_TARGET, %document, "run cancelled between stages");
                return PipelineResult::failure(PipelineError::Cancelled, attempted);
            }

            let resolved = match self.resolver.resolve(spec, context) {
                Ok(resolved) => resolved,
                Err(err) => {
                    debug!(
                        target: PIPELINE_TARGET,
                        %document,
                        formatter = spec.name(),
                        error = %err,
                        "formatter unavailable, stopping pipeline"
                    );
                    return PipelineResult::failure(err.into(), attempted);
                }
            };

            let limits = match stage_limits(request.mode(), started, token) {
                Ok(limits) => limits,
                Err(timeout_ms) => {
                    let err = ExecutionError::Timeout {
                        name: resolved.name().to_owned(),
                        timeout_ms,
                    };
                    return PipelineResult::failure(err.into(), attempted);
                }
            };

            let span = context
                .range()
                .filter(|_| !resolved.is_range_aware())
                .map(|range| LineSpan::locate(&current, range));
            let input = span.as_ref().map_or(current.as_str(), |found| found.text(&current));

            attempted.push(resolved.name().to_owned());
            let output = match self.executor.execute(&resolved, input, &limits) {
                Ok(output) => output,
                Err(err) => {
                    if !err.is_cancelled() {
                        warn!(
                            target: PIPELINE_TARGET,
                            %document,
                            formatter = resolved.name(),
                            error = %err,
                            "formatter failed, stopping pipeline"
                        );
                    }
                    return PipelineResult::failure(err.into(), attempted);
                }
            };

            let formatted = output.into_text();
            if formatted.is_empty() && !input.is_empty() && !resolved.allows_empty_output() {
                debug!(
                    target: PIPELINE_TARGET,
                    %document,
                    formatter = resolved.name(),
                    "empty output, keeping current text"
                );
                continue;
            }
            current = splice::merge(span.as_ref(), &current, formatted);
        }

        if token.is_cancelled() {
            debug!(target: PIPELINE_TARGET, %document, "run cancelled after final stage");
            return PipelineResult::failure(PipelineError::Cancelled, attempted);
        }

        debug!(
            target: PIPELINE_TARGET,
            %document,
            stages = attempted.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "pipeline completed"
        );
        PipelineResult::success(current, attempted)
    }
}

impl<E> Pipeline<E>
where
    E: FormatterExecutor + Send + Sync + 'static,
{
    /// Runs `request` over `text` on a worker thread and hands the result to
    /// `callback`.
    ///
    /// The callback runs exactly once, on the worker thread. When the run is
    /// cancelled through the returned handle it receives a result with no
    /// output and a [`PipelineError::Cancelled`] classification.
    ///
    /// # Errors
    ///
    /// Returns an error when the worker thread cannot be started.
    pub fn spawn<F>(
        self: &Arc<Self>,
        request: PipelineRequest,
        text: String,
        callback: F,
    ) -> io::Result<PipelineHandle>
    where
        F: FnOnce(PipelineResult) + Send + 'static,
    {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let pipeline = Arc::clone(self);
        let thread = thread::Builder::new()
            .name(format!("conform-pipeline-{}", request.context().document().get()))
            .spawn(move || {
                let result = pipeline.run_with_token(&request, &text, &worker_token);
                callback(result);
            })?;
        Ok(PipelineHandle { token, thread })
    }
}

/// Computes the bounds for the next stage.
///
/// Synchronous runs give each stage whatever remains of the shared deadline;
/// an exhausted deadline is reported as `Err(timeout_ms)`.
fn stage_limits(
    mode: ExecutionMode,
    started: Instant,
    token: &CancellationToken,
) -> Result<ExecLimits, u64> {
    let limits = ExecLimits::unbounded().with_cancel(token.clone());
    match mode {
        ExecutionMode::Async => Ok(limits),
        ExecutionMode::Sync { timeout } => {
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                Err(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
            } else {
                Ok(limits.with_timeout(remaining))
            }
        }
    }
}

/// Handle to an asynchronous pipeline run.
#[derive(Debug)]
pub struct PipelineHandle {
    token: CancellationToken,
    thread: JoinHandle<()>,
}

impl PipelineHandle {
    /// Abandons the run, killing its current process.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token observed by the run.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns true once the worker has delivered its callback.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the worker thread to exit.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the worker or its callback panicked.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

#[cfg(test)]
mod tests;
