//! Unit tests for the process executor.
//!
//! The real-process tests rely on POSIX shell utilities.

#![cfg(unix)]

use std::thread;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use super::*;

fn shell(name: &str, script: &str) -> ResolvedFormatter {
    ResolvedFormatter::for_test(name, "/bin/sh", &["-c", script])
}

#[fixture]
fn executor() -> ProcessExecutor {
    ProcessExecutor::default()
}

#[rstest]
fn stdin_formatter_echoes_output(executor: ProcessExecutor) {
    let formatter = shell("cat", "cat");
    let output = executor
        .execute(&formatter, "hello\n", &ExecLimits::unbounded())
        .expect("cat succeeds");
    assert_eq!(output.text(), "hello\n");
    assert_eq!(output.exit_code(), Some(0));
}

#[rstest]
fn stderr_is_captured_on_success(executor: ProcessExecutor) {
    let formatter = shell("noisy", "cat; echo warning >&2");
    let output = executor
        .execute(&formatter, "x", &ExecLimits::unbounded())
        .expect("succeeds");
    assert_eq!(output.text(), "x");
    assert_eq!(output.stderr().trim(), "warning");
}

#[rstest]
fn failing_exit_code_carries_stderr(executor: ProcessExecutor) {
    let formatter = shell("broken", "cat >/dev/null; echo 'syntax error' >&2; exit 1");
    let err = executor
        .execute(&formatter, "x = (\n", &ExecLimits::unbounded())
        .expect_err("exit 1 fails");
    match err {
        ExecutionError::ExitCode { name, code, stderr } => {
            assert_eq!(name, "broken");
            assert_eq!(code, Some(1));
            assert_eq!(stderr, "syntax error");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
fn silent_failure_gets_generic_message(executor: ProcessExecutor) {
    let formatter = shell("silent", "cat >/dev/null; exit 4");
    let err = executor
        .execute(&formatter, "x", &ExecLimits::unbounded())
        .expect_err("exit 4 fails");
    match err {
        ExecutionError::ExitCode { stderr, .. } => {
            assert!(stderr.contains("code 4"), "message: {stderr}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
fn custom_success_codes_are_honoured(executor: ProcessExecutor) {
    let formatter = shell("lenient", "cat; exit 2").with_exit_codes([0, 2]);
    let output = executor
        .execute(&formatter, "ok", &ExecLimits::unbounded())
        .expect("code 2 is success");
    assert_eq!(output.text(), "ok");
    assert_eq!(output.exit_code(), Some(2));
}

#[rstest]
fn timeout_kills_slow_process(executor: ProcessExecutor) {
    let formatter = shell("sleepy", "sleep 5");
    let limits = ExecLimits::unbounded().with_timeout(Duration::from_millis(100));
    let start = Instant::now();
    let err = executor
        .execute(&formatter, "", &limits)
        .expect_err("should time out");
    assert!(err.is_timeout(), "unexpected error: {err:?}");
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "timeout took {:?}",
        start.elapsed()
    );
}

#[rstest]
fn repeated_timeouts_do_not_accumulate(executor: ProcessExecutor) {
    let formatter = shell("sleepy", "sleep 5");
    let limits = ExecLimits::unbounded().with_timeout(Duration::from_millis(50));
    let start = Instant::now();
    for _ in 0..5 {
        let err = executor
            .execute(&formatter, "", &limits)
            .expect_err("should time out");
        assert!(err.is_timeout());
    }
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[rstest]
fn background_descendants_do_not_hold_the_run_open(executor: ProcessExecutor) {
    let formatter = shell("forking", "cat; sleep 3 & exit 0");
    let limits = ExecLimits::unbounded().with_timeout(Duration::from_millis(200));
    let start = Instant::now();
    let output = executor
        .execute(&formatter, "x\n", &limits)
        .expect("parent exits cleanly");
    assert_eq!(output.text(), "x\n");
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "run took {:?}",
        start.elapsed()
    );
}

#[rstest]
fn pipes_still_open_at_the_deadline_time_out(executor: ProcessExecutor) {
    let (held, results) = mpsc::channel::<PipeResult>();
    let limits = ExecLimits::unbounded().with_timeout(Duration::from_millis(50));
    let start = Instant::now();
    let err = executor
        .collect_streams("escaped", &results, 1, start, &limits)
        .err()
        .expect("deadline reached");
    drop(held);
    assert!(err.is_timeout(), "unexpected error: {err:?}");
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[rstest]
fn pipes_still_open_at_cancellation_are_abandoned(executor: ProcessExecutor) {
    let (held, results) = mpsc::channel::<PipeResult>();
    let token = CancellationToken::new();
    token.cancel();
    let limits = ExecLimits::unbounded().with_cancel(token);
    let err = executor
        .collect_streams("escaped", &results, 1, Instant::now(), &limits)
        .err()
        .expect("cancelled");
    drop(held);
    assert!(err.is_cancelled(), "unexpected error: {err:?}");
}

#[rstest]
fn cancellation_kills_running_process(executor: ProcessExecutor) {
    let formatter = shell("sleepy", "sleep 5");
    let token = CancellationToken::new();
    let limits = ExecLimits::unbounded().with_cancel(token.clone());
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        token.cancel();
    });
    let start = Instant::now();
    let err = executor
        .execute(&formatter, "", &limits)
        .expect_err("should be cancelled");
    canceller.join().expect("canceller thread");
    assert!(err.is_cancelled(), "unexpected error: {err:?}");
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[rstest]
#[case(EarlyExitPolicy::Error, true)]
#[case(EarlyExitPolicy::Tolerate, false)]
fn early_exit_follows_policy(#[case] policy: EarlyExitPolicy, #[case] fails: bool) {
    let executor = ProcessExecutor::new(policy);
    let formatter = shell("quitter", "exit 0");
    let input = "line\n".repeat(200_000);
    let result = executor.execute(&formatter, &input, &ExecLimits::unbounded());
    if fails {
        assert!(
            matches!(result, Err(ExecutionError::EarlyExit { .. })),
            "unexpected result: {result:?}"
        );
    } else {
        let output = result.expect("tolerated");
        assert_eq!(output.text(), "");
    }
}

#[rstest]
fn failing_exit_code_wins_over_early_exit() {
    let executor = ProcessExecutor::new(EarlyExitPolicy::Error);
    let formatter = shell("quitter", "echo bad >&2; exit 3");
    let input = "line\n".repeat(200_000);
    let err = executor
        .execute(&formatter, &input, &ExecLimits::unbounded())
        .expect_err("fails");
    assert!(matches!(err, ExecutionError::ExitCode { code: Some(3), .. }));
}

#[rstest]
fn temp_file_formatter_rewrites_in_place(executor: ProcessExecutor) {
    let formatter = ResolvedFormatter::for_test(
        "upper",
        "/bin/sh",
        &["-c", "tr a-z A-Z < \"$0\" > \"$0.out\" && mv \"$0.out\" \"$0\"", "$FILENAME"],
    )
    .with_input(InputMode::TempFile);
    let output = executor
        .execute(&formatter, "shout\n", &ExecLimits::unbounded())
        .expect("rewrite succeeds");
    assert_eq!(output.text(), "SHOUT\n");
}

#[rstest]
fn temp_file_is_removed_after_run(executor: ProcessExecutor) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let mut formatter =
        ResolvedFormatter::for_test("noop", "/bin/sh", &["-c", "true", "$FILENAME"])
            .with_input(InputMode::TempFile);
    formatter.path = dir.path().join("doc.txt");
    executor
        .execute(&formatter, "text", &ExecLimits::unbounded())
        .expect("succeeds");
    let leftovers = std::fs::read_dir(dir.path()).expect("read dir").count();
    assert_eq!(leftovers, 0);
}

#[rstest]
fn missing_binary_is_spawn_error(executor: ProcessExecutor) {
    let formatter = ResolvedFormatter::for_test("ghost", "/nonexistent/conform-fmt", &[]);
    let err = executor
        .execute(&formatter, "", &ExecLimits::unbounded())
        .expect_err("spawn fails");
    assert!(matches!(err, ExecutionError::Spawn { .. }));
}

#[rstest]
fn invalid_utf8_output_is_rejected(executor: ProcessExecutor) {
    let formatter = shell("binary", "cat >/dev/null; printf '\\377\\376'");
    let err = executor
        .execute(&formatter, "", &ExecLimits::unbounded())
        .expect_err("invalid output");
    assert!(matches!(err, ExecutionError::InvalidOutput { .. }));
}

#[rstest]
fn resolved_environment_is_the_whole_environment(executor: ProcessExecutor) {
    let mut formatter = shell("env", "printf '%s:%s' \"$CONFORM_PROBE\" \"${HOME:-unset}\"");
    formatter.env = [
        (String::from("CONFORM_PROBE"), String::from("on")),
        (String::from("PATH"), String::from("/usr/bin:/bin")),
    ]
    .into_iter()
    .collect();
    let output = executor
        .execute(&formatter, "", &ExecLimits::unbounded())
        .expect("succeeds");
    assert_eq!(output.text(), "on:unset");
}

#[rstest]
fn working_directory_is_applied(executor: ProcessExecutor) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let mut formatter = shell("pwd", "pwd -P");
    formatter.cwd = Some(dir.path().to_path_buf());
    let output = executor
        .execute(&formatter, "", &ExecLimits::unbounded())
        .expect("succeeds");
    let expected = dir.path().canonicalize().expect("canonical");
    assert_eq!(output.text().trim(), expected.display().to_string());
}
