//! Unit tests for failure classification.

use std::str::FromStr;
use std::sync::Arc;

use conform_runner::DocumentId;
use rstest::rstest;

use super::*;

fn exit_failure() -> PipelineError {
    PipelineError::Execution(ExecutionError::ExitCode {
        name: "black".into(),
        code: Some(1),
        stderr: "syntax error".into(),
    })
}

#[rstest]
#[case::no_formatters(PipelineError::NoFormatters, ErrorCode::NoFormatters, Severity::Warn)]
#[case::not_found(
    PipelineError::Resolution(ResolutionError::CommandNotFound {
        name: "a".into(),
        command: "a-bin".into(),
    }),
    ErrorCode::CommandNotFound,
    Severity::Warn
)]
#[case::exit_code(exit_failure(), ErrorCode::ExitCode, Severity::Error)]
#[case::timeout(
    PipelineError::Execution(ExecutionError::Timeout { name: "a".into(), timeout_ms: 100 }),
    ErrorCode::Timeout,
    Severity::Error
)]
#[case::stage_cancelled(
    PipelineError::Execution(ExecutionError::Cancelled { name: "a".into() }),
    ErrorCode::Cancelled,
    Severity::Info
)]
#[case::cancelled(PipelineError::Cancelled, ErrorCode::Cancelled, Severity::Info)]
fn pipeline_errors_are_classified(
    #[case] error: PipelineError,
    #[case] code: ErrorCode,
    #[case] severity: Severity,
) {
    assert_eq!(error.code(), code);
    assert_eq!(error.severity(), severity);
}

#[test]
fn concurrent_modification_is_a_warning() {
    let error = BufferError::ConcurrentModification {
        document: DocumentId::new(1),
        expected: 0,
        actual: 2,
    };
    assert_eq!(error.code(), ErrorCode::ConcurrentModification);
    assert_eq!(error.severity(), Severity::Warn);
}

#[test]
fn session_errors_delegate_to_their_source() {
    let error = SessionError::from(exit_failure());
    assert_eq!(error.code(), ErrorCode::ExitCode);

    let worker = SessionError::Worker(Arc::new(std::io::Error::other("no threads")));
    assert_eq!(worker.code(), ErrorCode::WorkerUnavailable);
    assert_eq!(worker.severity(), Severity::Error);
}

#[rstest]
#[case(ErrorCode::NoFormatters, "no_formatters")]
#[case(ErrorCode::ExitCode, "exit_code")]
#[case(ErrorCode::ConcurrentModification, "concurrent_modification")]
fn codes_have_stable_strings(#[case] code: ErrorCode, #[case] expected: &str) {
    assert_eq!(code.as_str(), expected);
    assert_eq!(code.to_string(), expected);
    assert_eq!(ErrorCode::from_str(expected).expect("parse"), code);
}

#[test]
fn severity_parses_case_insensitively() {
    assert_eq!(Severity::from_str("WARN").expect("parse"), Severity::Warn);
    assert!(Severity::Info < Severity::Error);
}

#[test]
fn process_failures_get_a_generic_summary() {
    let report = Report::from_error(&exit_failure());
    assert_eq!(report.severity(), Severity::Error);
    assert!(report.summary().contains("see diagnostics"));
    assert!(!report.summary().contains("syntax error"));
    assert!(report.detail().contains("syntax error"));
}

#[test]
fn other_failures_use_their_message() {
    let report = Report::from_error(&PipelineError::NoFormatters);
    assert_eq!(report.summary(), "no formatters available");
    assert_eq!(report.summary(), report.detail());
}

#[rstest]
#[case(false, false)]
#[case(true, true)]
fn availability_failures_notify_only_when_requested(
    #[case] explicitly_requested: bool,
    #[case] expected: bool,
) {
    let error = PipelineError::Resolution(ResolutionError::ConditionFailed { name: "a".into() });
    let report = Report::from_error(&error);
    assert_eq!(report.should_notify(explicitly_requested), expected);
}

#[test]
fn cancellations_are_never_surfaced() {
    let report = Report::from_error(&PipelineError::Cancelled);
    assert!(!report.should_notify(true));
    assert!(Report::from_error(&exit_failure()).should_notify(false));
}
