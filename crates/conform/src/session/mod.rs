//! Formatting sessions tying the pipeline to live documents.
//!
//! A [`FormatSession`] snapshots a document, runs the formatter pipeline over
//! the snapshot text and reconciles the final output back into the document.
//! At most one run is in flight per document: starting another request for
//! the same document cancels the earlier one, which kills its process and
//! discards its output.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use conform_buffer::{
    ApplyOutcome, BufferError, Document, DocumentSnapshot, TextEdit, dry_run, reconcile,
};
use conform_config::Config;
use conform_runner::{
    CancellationToken, ConfigResolver, DocumentId, ExecutionContext, ExecutionError,
    ExecutionMode, FormatterExecutor, FormatterSpec, Pipeline, PipelineError, PipelineErrorKind,
    PipelineHandle, PipelineRequest, PipelineResult, ProcessExecutor, Range, Selection,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Tracing target for session activity.
const SESSION_TARGET: &str = "conform::session";

/// Errors surfaced by a [`FormatSession`].
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The pipeline did not produce output.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The output could not be applied to the document.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// The worker thread for an asynchronous run could not be started.
    #[error("failed to start formatting worker: {0}")]
    Worker(#[source] Arc<io::Error>),

    /// A thread panicked while holding the document lock.
    #[error("document {0} is unavailable after a panic while it was locked")]
    DocumentPoisoned(DocumentId),
}

impl SessionError {
    /// Returns true when the run was cancelled or superseded.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Pipeline(
                PipelineError::Cancelled | PipelineError::Execution(ExecutionError::Cancelled { .. })
            )
        )
    }
}

/// One formatting request against a document.
#[derive(Debug, Clone)]
pub struct FormatRequest {
    path: PathBuf,
    formatters: Vec<FormatterSpec>,
    range: Option<Range>,
    selection: Option<Selection>,
}

impl FormatRequest {
    /// Formats the whole document at `path` with `formatters`, in order.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, formatters: Vec<FormatterSpec>) -> Self {
        Self {
            path: path.into(),
            formatters,
            range: None,
            selection: None,
        }
    }

    /// Restricts the request to `range`.
    #[must_use]
    pub const fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// Restricts the request to the active `selection`.
    ///
    /// The selection is normalised against the document text when the
    /// request runs. An explicit range takes precedence.
    #[must_use]
    pub const fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Path of the document on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Formatters to run.
    #[must_use]
    pub fn formatters(&self) -> &[FormatterSpec] {
        &self.formatters
    }

    /// Explicitly requested range, if any.
    #[must_use]
    pub const fn range(&self) -> Option<Range> {
        self.range
    }

    /// Active selection, if any.
    #[must_use]
    pub const fn selection(&self) -> Option<Selection> {
        self.selection
    }

    fn pipeline_request(
        &self,
        snapshot: &DocumentSnapshot,
        mode: ExecutionMode,
    ) -> PipelineRequest {
        let mut builder = ExecutionContext::builder(snapshot.document(), self.path.clone());
        if let Some(range) = self.range {
            builder = builder.range(range);
        }
        if let Some(selection) = self.selection {
            builder = builder.selection(selection, snapshot.text());
        }
        PipelineRequest::new(builder.build(), self.formatters.clone(), mode)
    }
}

/// What a successful request did to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOutcome {
    apply: ApplyOutcome,
    attempted: Vec<String>,
}

impl FormatOutcome {
    /// Reconciliation result.
    #[must_use]
    pub const fn apply(&self) -> &ApplyOutcome {
        &self.apply
    }

    /// Edits applied, or that would be applied for a preview.
    #[must_use]
    pub fn edits(&self) -> &[TextEdit] {
        self.apply.edits()
    }

    /// Returns true when the document changed (or would change).
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        self.apply.is_applied()
    }

    /// Names of the formatters whose processes ran, in order.
    #[must_use]
    pub fn attempted(&self) -> &[String] {
        &self.attempted
    }
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    token: CancellationToken,
}

/// Runs formatting requests against documents.
#[derive(Debug)]
pub struct FormatSession<E = ProcessExecutor> {
    pipeline: Arc<Pipeline<E>>,
    timeout: Duration,
    in_flight: Arc<Mutex<HashMap<DocumentId, InFlight>>>,
    generation: AtomicU64,
}

impl FormatSession<ProcessExecutor> {
    /// Builds a session using real processes and the runtime configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let pipeline = Pipeline::new(
            ConfigResolver::from_process_env(),
            ProcessExecutor::from_config(config),
        );
        Self::new(pipeline, config.timeout())
    }
}

impl<E: FormatterExecutor> FormatSession<E> {
    /// Wraps `pipeline`; synchronous requests are bounded by `timeout`.
    #[must_use]
    pub fn new(pipeline: Pipeline<E>, timeout: Duration) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            timeout,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Timeout applied to synchronous requests.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Underlying pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline<E> {
        &self.pipeline
    }

    /// Formats `document` on the calling thread and applies the result.
    ///
    /// Any asynchronous run still in flight for the document is cancelled
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Pipeline`] when the pipeline fails (including
    /// a timeout) and [`SessionError::Buffer`] when the output cannot be
    /// applied.
    pub fn format<D: Document + ?Sized>(
        &self,
        document: &mut D,
        request: &FormatRequest,
    ) -> Result<FormatOutcome, SessionError> {
        let snapshot = DocumentSnapshot::capture(document);
        let (text, attempted, range) = self.run_sync(&snapshot, request)?;
        let apply = reconcile(document, &snapshot, &text, range)?;
        log_outcome(snapshot.document(), &apply);
        Ok(FormatOutcome { apply, attempted })
    }

    /// Formats `document` without modifying it, reporting the edits that
    /// [`FormatSession::format`] would apply.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`FormatSession::format`].
    pub fn preview<D: Document + ?Sized>(
        &self,
        document: &D,
        request: &FormatRequest,
    ) -> Result<FormatOutcome, SessionError> {
        let snapshot = DocumentSnapshot::capture(document);
        let (text, attempted, range) = self.run_sync(&snapshot, request)?;
        let apply = dry_run(document, &snapshot, &text, range)?;
        Ok(FormatOutcome { apply, attempted })
    }

    /// Cancels the in-flight run for `document`, if there is one.
    pub fn cancel(&self, document: DocumentId) {
        if supersede(&mut lock_runs(&self.in_flight), document) {
            debug!(target: SESSION_TARGET, %document, "cancelled in-flight run");
        }
    }

    /// Returns true while an asynchronous run for `document` is in flight.
    #[must_use]
    pub fn is_in_flight(&self, document: DocumentId) -> bool {
        lock_runs(&self.in_flight).contains_key(&document)
    }

    fn run_sync(
        &self,
        snapshot: &DocumentSnapshot,
        request: &FormatRequest,
    ) -> Result<(String, Vec<String>, Option<Range>), SessionError> {
        self.cancel(snapshot.document());
        let pipeline_request = request.pipeline_request(
            snapshot,
            ExecutionMode::Sync {
                timeout: self.timeout,
            },
        );
        let result = self.pipeline.run(&pipeline_request, snapshot.text());
        let (text, attempted) = into_text(result)?;
        Ok((text, attempted, pipeline_request.context().range()))
    }
}

impl<E> FormatSession<E>
where
    E: FormatterExecutor + Send + Sync + 'static,
{
    /// Formats `document` on a worker thread.
    ///
    /// The document is snapshotted immediately; the result is reconciled on
    /// the worker once the pipeline finishes, then handed to `callback`. A
    /// later request for the same document, or [`FormatSession::cancel`],
    /// supersedes this run: its process is killed and `callback` receives a
    /// cancellation error without the document being touched.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DocumentPoisoned`] when the document lock is
    /// poisoned and [`SessionError::Worker`] when no thread can be started.
    pub fn format_async<D, F>(
        &self,
        document: &Arc<Mutex<D>>,
        request: FormatRequest,
        callback: F,
    ) -> Result<PipelineHandle, SessionError>
    where
        D: Document + Send + 'static,
        F: FnOnce(Result<FormatOutcome, SessionError>) + Send + 'static,
    {
        let snapshot = {
            let guard = document.lock().map_err(|poisoned| {
                SessionError::DocumentPoisoned(poisoned.get_ref().id())
            })?;
            DocumentSnapshot::capture(&*guard)
        };
        let id = snapshot.document();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let pipeline_request = request.pipeline_request(&snapshot, ExecutionMode::Async);
        let text = snapshot.text().to_owned();

        let completion = Completion {
            document: Arc::clone(document),
            in_flight: Arc::clone(&self.in_flight),
            range: pipeline_request.context().range(),
            snapshot,
            generation,
        };

        // Held across the spawn so the worker cannot finish before its entry
        // exists.
        let mut runs = lock_runs(&self.in_flight);
        if supersede(&mut runs, id) {
            debug!(target: SESSION_TARGET, document = %id, "superseded earlier run");
        }
        let handle = self
            .pipeline
            .spawn(pipeline_request, text, move |result| {
                callback(completion.finish(result));
            })
            .map_err(|err| SessionError::Worker(Arc::new(err)))?;
        runs.insert(
            id,
            InFlight {
                generation,
                token: handle.token().clone(),
            },
        );
        Ok(handle)
    }
}

/// State the worker needs to apply its result.
struct Completion<D> {
    document: Arc<Mutex<D>>,
    in_flight: Arc<Mutex<HashMap<DocumentId, InFlight>>>,
    snapshot: DocumentSnapshot,
    range: Option<Range>,
    generation: u64,
}

impl<D: Document> Completion<D> {
    fn finish(self, result: PipelineResult) -> Result<FormatOutcome, SessionError> {
        let id = self.snapshot.document();
        if !self.retire() {
            debug!(target: SESSION_TARGET, document = %id, "discarding superseded result");
            return Err(PipelineError::Cancelled.into());
        }
        let (text, attempted) = into_text(result)?;
        let mut guard = self
            .document
            .lock()
            .map_err(|_| SessionError::DocumentPoisoned(id))?;
        let apply = reconcile(&mut *guard, &self.snapshot, &text, self.range)?;
        log_outcome(id, &apply);
        Ok(FormatOutcome { apply, attempted })
    }

    /// Removes this run's entry, returning false when it was superseded.
    fn retire(&self) -> bool {
        let mut runs = lock_runs(&self.in_flight);
        let id = self.snapshot.document();
        let current = runs
            .get(&id)
            .is_some_and(|run| run.generation == self.generation);
        if current {
            runs.remove(&id);
        }
        current
    }
}

fn lock_runs(
    runs: &Mutex<HashMap<DocumentId, InFlight>>,
) -> MutexGuard<'_, HashMap<DocumentId, InFlight>> {
    runs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancels and forgets the run for `document`.
fn supersede(runs: &mut HashMap<DocumentId, InFlight>, document: DocumentId) -> bool {
    let Some(run) = runs.remove(&document) else {
        return false;
    };
    run.token.cancel();
    true
}

fn into_text(result: PipelineResult) -> Result<(String, Vec<String>), SessionError> {
    let attempted = result.attempted().to_vec();
    if let Some(error) = result
        .error()
        .filter(|error| error.kind() != PipelineErrorKind::Cancelled)
    {
        warn!(
            target: SESSION_TARGET,
            %error,
            attempted = ?attempted,
            "formatting failed"
        );
    }
    let text = result.into_output()?;
    Ok((text, attempted))
}

fn log_outcome(document: DocumentId, outcome: &ApplyOutcome) {
    info!(
        target: SESSION_TARGET,
        %document,
        edits = outcome.edits().len(),
        "formatting finished"
    );
}
