//! Process-based formatter execution.
//!
//! [`ProcessExecutor`] implements [`FormatterExecutor`] by spawning the
//! resolved command, feeding it input on a helper thread, draining its
//! standard output and standard error on two more, and polling for exit.
//! Synchronous runs enforce a deadline; asynchronous runs poll a
//! [`CancellationToken`] instead. Either way a process that must be abandoned
//! is killed together with its process group and reaped, so repeated
//! timeouts do not leak children or pipe handles.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use conform_config::{Config, EarlyExitPolicy};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::ExecutionError;
use crate::spec::{InputMode, ResolvedFormatter};

/// Tracing target for formatter process operations.
const PROCESS_TARGET: &str = "conform_runner::process";

/// Interval between exit-status polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Bounds applied to one process execution.
#[derive(Debug, Clone, Default)]
pub struct ExecLimits {
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl ExecLimits {
    /// No deadline and no cancellation.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Kills the process once `timeout` has elapsed.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Kills the process once `token` is cancelled.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Deadline for the process, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Cancellation token, if any.
    #[must_use]
    pub const fn cancel(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Output of a formatter process that exited successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    text: String,
    stderr: String,
    exit_code: Option<i32>,
}

impl ProcessOutput {
    /// Builds an output record.
    #[must_use]
    pub fn new(text: impl Into<String>, stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            text: text.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Formatted text: standard output, or the rewritten temporary file.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consumes the record and returns the formatted text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    /// Captured standard error.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

/// Trait abstracting formatter process execution for testability.
///
/// The production implementation is [`ProcessExecutor`]. Test code can
/// implement this trait to script outputs without spawning processes.
pub trait FormatterExecutor {
    /// Runs `formatter` over `input` within `limits`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] when the process cannot be spawned,
    /// exits with a code outside the formatter's success set, exits before
    /// consuming its input (subject to policy), times out, is cancelled, or
    /// produces unusable output.
    fn execute(
        &self,
        formatter: &ResolvedFormatter,
        input: &str,
        limits: &ExecLimits,
    ) -> Result<ProcessOutput, ExecutionError>;
}

/// Executes formatters as real child processes.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    early_exit: EarlyExitPolicy,
    poll_interval: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(EarlyExitPolicy::default())
    }
}

impl ProcessExecutor {
    /// Creates an executor applying `early_exit` to processes that stop
    /// reading their input.
    #[must_use]
    pub const fn new(early_exit: EarlyExitPolicy) -> Self {
        Self {
            early_exit,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Creates an executor from runtime configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.early_exit())
    }

    /// Early-exit classification in effect.
    #[must_use]
    pub const fn early_exit(&self) -> EarlyExitPolicy {
        self.early_exit
    }
}

impl FormatterExecutor for ProcessExecutor {
    fn execute(
        &self,
        formatter: &ResolvedFormatter,
        input: &str,
        limits: &ExecLimits,
    ) -> Result<ProcessOutput, ExecutionError> {
        match formatter.input() {
            InputMode::Stdin => {
                let raw = self.run(formatter, formatter.args(), Some(input.as_bytes()), limits)?;
                let text = String::from_utf8(raw.stdout).map_err(|err| {
                    ExecutionError::InvalidOutput {
                        name: formatter.name().to_owned(),
                        message: err.to_string(),
                    }
                })?;
                Ok(ProcessOutput::new(text, raw.stderr, raw.exit_code))
            }
            InputMode::TempFile => {
                let temp = write_temp_file(formatter, input)?;
                let args = formatter.args_for_file(temp.path());
                let raw = self.run(formatter, &args, None, limits)?;
                let text = fs::read_to_string(temp.path()).map_err(|err| {
                    temp_file_error(formatter.name(), temp.path(), err)
                })?;
                Ok(ProcessOutput::new(text, raw.stderr, raw.exit_code))
            }
        }
    }
}

/// Captured streams of a process that exited with a success code.
struct RawOutput {
    stdout: Vec<u8>,
    stderr: String,
    exit_code: Option<i32>,
}

/// Result reported by one pipe helper thread.
enum PipeResult {
    Stdin(io::Result<()>),
    Stdout(io::Result<Vec<u8>>),
    Stderr(io::Result<Vec<u8>>),
}

/// Pipe results gathered after the child exits.
#[derive(Default)]
struct Streams {
    write: Option<io::Result<()>>,
    stdout: Option<io::Result<Vec<u8>>>,
    stderr: Option<io::Result<Vec<u8>>>,
}

impl Streams {
    fn record(&mut self, result: PipeResult) {
        match result {
            PipeResult::Stdin(write) => self.write = Some(write),
            PipeResult::Stdout(bytes) => self.stdout = Some(bytes),
            PipeResult::Stderr(bytes) => self.stderr = Some(bytes),
        }
    }
}

impl ProcessExecutor {
    fn run(
        &self,
        formatter: &ResolvedFormatter,
        args: &[String],
        input: Option<&[u8]>,
        limits: &ExecLimits,
    ) -> Result<RawOutput, ExecutionError> {
        let name = formatter.name();
        let start = Instant::now();
        let mut child = spawn(formatter, args, input.is_some())?;

        let (sender, results) = mpsc::channel();
        let mut pending = 0_usize;
        if let (Some(bytes), Some(stdin)) = (input, child.stdin.take()) {
            spawn_writer(bytes.to_vec(), stdin, sender.clone());
            pending += 1;
        }
        if let Some(pipe) = child.stdout.take() {
            spawn_reader(pipe, sender.clone(), PipeResult::Stdout);
            pending += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            spawn_reader(pipe, sender.clone(), PipeResult::Stderr);
            pending += 1;
        }
        drop(sender);

        let status = self.wait_for_exit(name, &mut child, start, limits)?;
        // Background descendants would otherwise keep the pipes open.
        kill_group(&child);
        let streams = self.collect_streams(name, &results, pending, start, limits)?;

        let stdout_bytes = streams
            .stdout
            .transpose()
            .map_err(|err| io_error(name, err))?
            .unwrap_or_default();
        let stderr_text = streams
            .stderr
            .transpose()
            .map_err(|err| io_error(name, err))?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();

        let exit_code = status.code();
        debug!(
            target: PROCESS_TARGET,
            formatter = name,
            ?exit_code,
            stdout_bytes = stdout_bytes.len(),
            stderr_bytes = stderr_text.len(),
            "formatter process exited"
        );

        if !formatter.is_success(exit_code) {
            return Err(ExecutionError::ExitCode {
                name: name.to_owned(),
                code: exit_code,
                stderr: failure_message(&stderr_text, exit_code),
            });
        }

        match streams.write {
            Some(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => match self.early_exit {
                EarlyExitPolicy::Error => {
                    return Err(ExecutionError::EarlyExit {
                        name: name.to_owned(),
                        code: exit_code,
                    });
                }
                EarlyExitPolicy::Tolerate => {
                    debug!(
                        target: PROCESS_TARGET,
                        formatter = name,
                        "formatter exited before consuming input; tolerated"
                    );
                }
            },
            Some(Err(err)) => return Err(io_error(name, err)),
            Some(Ok(())) | None => {}
        }

        Ok(RawOutput {
            stdout: stdout_bytes,
            stderr: stderr_text,
            exit_code,
        })
    }

    /// Polls the child until it exits, the deadline passes, or the run is
    /// cancelled.
    fn wait_for_exit(
        &self,
        name: &str,
        child: &mut Child,
        start: Instant,
        limits: &ExecLimits,
    ) -> Result<ExitStatus, ExecutionError> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(err) => {
                    terminate(child);
                    return Err(io_error(name, err));
                }
            }
            if let Some(err) = limit_exceeded(name, start, limits) {
                terminate(child);
                return Err(err);
            }
            thread::sleep(self.pause(start, limits));
        }
    }

    /// Waits for the pipe helpers under the same deadline as the process.
    ///
    /// Helpers still blocked when the limit is hit are left detached; their
    /// results are dropped with the channel.
    fn collect_streams(
        &self,
        name: &str,
        results: &Receiver<PipeResult>,
        mut pending: usize,
        start: Instant,
        limits: &ExecLimits,
    ) -> Result<Streams, ExecutionError> {
        let mut streams = Streams::default();
        while pending > 0 {
            match results.recv_timeout(self.pause(start, limits)) {
                Ok(result) => {
                    streams.record(result);
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(err) = limit_exceeded(name, start, limits) {
                        return Err(err);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(target: PROCESS_TARGET, formatter = name, "pipe thread panicked");
                    return Err(io_error(name, io::Error::other("pipe thread panicked")));
                }
            }
        }
        Ok(streams)
    }

    /// Poll interval, shortened so a deadline is never overslept.
    fn pause(&self, start: Instant, limits: &ExecLimits) -> Duration {
        limits.timeout().map_or(self.poll_interval, |timeout| {
            self.poll_interval
                .min(timeout.saturating_sub(start.elapsed()))
        })
    }
}

/// Returns the error for a run that was cancelled or outlived its deadline.
fn limit_exceeded(name: &str, start: Instant, limits: &ExecLimits) -> Option<ExecutionError> {
    if limits.is_cancelled() {
        debug!(target: PROCESS_TARGET, formatter = name, "run cancelled");
        return Some(ExecutionError::Cancelled {
            name: name.to_owned(),
        });
    }
    let timeout = limits.timeout()?;
    if start.elapsed() < timeout {
        return None;
    }
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    warn!(
        target: PROCESS_TARGET,
        formatter = name,
        timeout_ms,
        "formatter timed out"
    );
    Some(ExecutionError::Timeout {
        name: name.to_owned(),
        timeout_ms,
    })
}

fn spawn(
    formatter: &ResolvedFormatter,
    args: &[String],
    pipe_stdin: bool,
) -> Result<Child, ExecutionError> {
    let mut command = Command::new(formatter.command());
    command
        .args(args)
        .env_clear()
        .envs(formatter.env())
        .stdin(if pipe_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = formatter.cwd() {
        command.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    debug!(
        target: PROCESS_TARGET,
        formatter = formatter.name(),
        command = %formatter.command().display(),
        ?args,
        "spawning formatter process"
    );

    command.spawn().map_err(|err| ExecutionError::Spawn {
        name: formatter.name().to_owned(),
        source: Arc::new(err),
    })
}

/// Writes the input and closes the pipe to signal end of input.
fn spawn_writer<W>(bytes: Vec<u8>, mut stdin: W, results: Sender<PipeResult>)
where
    W: Write + Send + 'static,
{
    // Detached: the outcome arrives on the channel.
    drop(thread::spawn(move || {
        let written = stdin.write_all(&bytes).and_then(|()| stdin.flush());
        if results.send(PipeResult::Stdin(written)).is_err() {
            debug!(target: PROCESS_TARGET, "run abandoned before input was written");
        }
    }));
}

/// Drains a pipe so the child never blocks on a full buffer.
fn spawn_reader<R>(
    mut reader: R,
    results: Sender<PipeResult>,
    wrap: fn(io::Result<Vec<u8>>) -> PipeResult,
) where
    R: Read + Send + 'static,
{
    drop(thread::spawn(move || {
        let mut buffer = Vec::new();
        let read = reader.read_to_end(&mut buffer).map(|_| buffer);
        if results.send(wrap(read)).is_err() {
            debug!(target: PROCESS_TARGET, "run abandoned before output was drained");
        }
    }));
}

fn io_error(name: &str, source: io::Error) -> ExecutionError {
    ExecutionError::Io {
        name: name.to_owned(),
        source: Arc::new(source),
    }
}

/// Kills the child and its process group, then reaps it.
///
/// Failures are logged only: the child may already have exited.
fn terminate(child: &mut Child) {
    kill_group(child);
    if let Err(err) = child.kill() {
        debug!(target: PROCESS_TARGET, error = %err, "kill after group signal failed");
    }
    if let Err(err) = child.wait() {
        warn!(target: PROCESS_TARGET, error = %err, "failed to reap formatter process");
    }
}

/// Sends `SIGKILL` to the child's process group.
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let signalled = i32::try_from(child.id())
        .ok()
        .map(|pid| killpg(Pid::from_raw(pid), Signal::SIGKILL));
    if let Some(Err(errno)) = signalled {
        debug!(target: PROCESS_TARGET, %errno, "process group already gone");
    }
}

#[cfg(not(unix))]
const fn kill_group(_child: &Child) {}

fn failure_message(stderr: &str, code: Option<i32>) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        code.map_or_else(
            || String::from("formatter terminated without output; see logs for details"),
            |value| format!("formatter exited with code {value}; see logs for details"),
        )
    } else {
        trimmed.to_owned()
    }
}

/// Writes the input next to the original file so tools that look for
/// project configuration find it.
fn write_temp_file(
    formatter: &ResolvedFormatter,
    input: &str,
) -> Result<NamedTempFile, ExecutionError> {
    let path = formatter.document_path();
    let suffix = path
        .file_name()
        .map(|file| format!(".{}", file.to_string_lossy()))
        .unwrap_or_default();
    let dir = path
        .parent()
        .filter(|parent| parent.is_dir())
        .map_or_else(std::env::temp_dir, Path::to_path_buf);

    let mut temp = tempfile::Builder::new()
        .prefix(".conform.")
        .suffix(&suffix)
        .tempfile_in(&dir)
        .map_err(|err| temp_file_error(formatter.name(), &dir, err))?;
    temp.write_all(input.as_bytes())
        .and_then(|()| temp.flush())
        .map_err(|err| temp_file_error(formatter.name(), temp.path(), err))?;
    Ok(temp)
}

fn temp_file_error(name: &str, path: &Path, source: io::Error) -> ExecutionError {
    ExecutionError::TempFile {
        name: name.to_owned(),
        path: PathBuf::from(path),
        source: Arc::new(source),
    }
}

#[cfg(test)]
mod tests;
