//! Unit tests for pipeline composition.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::mpsc;

use mockall::mock;
use rstest::{fixture, rstest};

use super::*;
use crate::context::{DocumentId, Range};
use crate::error::{PipelineErrorKind, ResolutionError};
use crate::process::ProcessOutput;
use crate::spec::{Dynamic, ResolvedFormatter};

mock! {
    Executor {}
    impl FormatterExecutor for Executor {
        fn execute(
            &self,
            formatter: &ResolvedFormatter,
            input: &str,
            limits: &ExecLimits,
        ) -> Result<ProcessOutput, ExecutionError>;
    }
}

type Script = dyn Fn(&str, &str, &ExecLimits) -> Result<String, ExecutionError> + Send + Sync;

/// Executor that records every call and answers from a closure.
struct ScriptedExecutor {
    script: Box<Script>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedExecutor {
    fn new(
        script: impl Fn(&str, &str, &ExecLimits) -> Result<String, ExecutionError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl FormatterExecutor for ScriptedExecutor {
    fn execute(
        &self,
        formatter: &ResolvedFormatter,
        input: &str,
        limits: &ExecLimits,
    ) -> Result<ProcessOutput, ExecutionError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((formatter.name().to_owned(), input.to_owned()));
        (self.script)(formatter.name(), input, limits).map(|text| ProcessOutput::new(text, "", Some(0)))
    }
}

fn binary() -> String {
    std::env::current_exe()
        .expect("current exe")
        .display()
        .to_string()
}

fn spec(name: &str) -> FormatterSpec {
    FormatterSpec::new(name, binary())
}

fn resolver() -> ConfigResolver {
    ConfigResolver::with_env(BTreeMap::new())
}

#[fixture]
fn context() -> ExecutionContext {
    ExecutionContext::new(DocumentId::new(7), "/project/src/lib.py")
}

fn sync_request(context: ExecutionContext, formatters: Vec<FormatterSpec>) -> PipelineRequest {
    PipelineRequest::new(
        context,
        formatters,
        ExecutionMode::Sync {
            timeout: Duration::from_secs(5),
        },
    )
}

fn exit_failure(name: &str) -> ExecutionError {
    ExecutionError::ExitCode {
        name: name.to_owned(),
        code: Some(1),
        stderr: String::from("syntax error"),
    }
}

#[rstest]
fn empty_formatter_list_reports_no_formatters(context: ExecutionContext) {
    let mut executor = MockExecutor::new();
    executor.expect_execute().times(0);
    let pipeline = Pipeline::new(resolver(), executor);

    let result = pipeline.run(&sync_request(context, Vec::new()), "text");

    assert!(result.output().is_none());
    assert_eq!(
        result.error().map(PipelineError::kind),
        Some(PipelineErrorKind::NoFormatters)
    );
    assert!(result.attempted().is_empty());
}

#[rstest]
fn stages_chain_in_order(context: ExecutionContext) {
    let mut executor = MockExecutor::new();
    let mut sequence = mockall::Sequence::new();
    executor
        .expect_execute()
        .withf(|formatter, input, _| formatter.name() == "A" && input == "x\n")
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_, _, _| Ok(ProcessOutput::new("y\n", "", Some(0))));
    executor
        .expect_execute()
        .withf(|formatter, input, _| formatter.name() == "B" && input == "y\n")
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_, _, _| Ok(ProcessOutput::new("z\n", "", Some(0))));
    let pipeline = Pipeline::new(resolver(), executor);

    let result = pipeline.run(&sync_request(context, vec![spec("A"), spec("B")]), "x\n");

    assert_eq!(result.output(), Some("z\n"));
    assert!(result.error().is_none());
    assert_eq!(result.attempted(), ["A", "B"]);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
fn failing_stage_stops_later_stages(context: ExecutionContext, #[case] failing: usize) {
    let names = ["s1", "s2", "s3", "s4"];
    let fail_name = names.get(failing - 1).copied().expect("valid stage");
    let executor = ScriptedExecutor::new(move |name, input, _| {
        if name == fail_name {
            Err(exit_failure(name))
        } else {
            Ok(input.to_owned())
        }
    });
    let pipeline = Pipeline::new(resolver(), executor);
    let specs = names.iter().map(|name| spec(name)).collect();

    let result = pipeline.run(&sync_request(context, specs), "text\n");

    assert!(result.output().is_none());
    assert_eq!(
        result.error().map(PipelineError::kind),
        Some(PipelineErrorKind::Execution)
    );
    assert_eq!(pipeline.executor().calls().len(), failing);
    assert_eq!(result.attempted().len(), failing);
}

#[rstest]
fn exit_failure_message_is_preserved(context: ExecutionContext) {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|_, input, _| input == "x = (\n")
        .times(1)
        .returning(|formatter, _, _| Err(exit_failure(formatter.name())));
    let pipeline = Pipeline::new(resolver(), executor);

    let result = pipeline.run(&sync_request(context, vec![spec("black")]), "x = (\n");

    let err = result.error().expect("error");
    assert!(err.to_string().contains("syntax error"), "message: {err}");
    assert!(result.output().is_none());
}

#[rstest]
fn unavailable_formatter_stops_pipeline(context: ExecutionContext) {
    let executor = ScriptedExecutor::new(|_, input, _| Ok(input.to_uppercase()));
    let pipeline = Pipeline::new(resolver(), executor);
    let specs = vec![
        spec("first"),
        FormatterSpec::new("missing", "conform-no-such-formatter"),
        spec("third"),
    ];

    let result = pipeline.run(&sync_request(context, specs), "abc\n");

    let err = result.error().expect("error");
    assert!(matches!(
        err,
        PipelineError::Resolution(ResolutionError::CommandNotFound { .. })
    ));
    assert_eq!(result.attempted(), ["first"]);
    assert_eq!(pipeline.executor().calls().len(), 1);
}

#[rstest]
fn false_condition_stops_pipeline(context: ExecutionContext) {
    let mut executor = MockExecutor::new();
    executor.expect_execute().times(0);
    let pipeline = Pipeline::new(resolver(), executor);
    let specs = vec![spec("rustfmt").with_condition(Dynamic::computed(|ctx: &ExecutionContext| {
        ctx.path().extension().is_some_and(|ext| ext == "rs")
    }))];

    let result = pipeline.run(&sync_request(context, specs), "x");

    assert_eq!(
        result.error().map(PipelineError::kind),
        Some(PipelineErrorKind::Resolution)
    );
    assert!(result.attempted().is_empty());
}

#[rstest]
#[case(false, "keep me\n")]
#[case(true, "")]
fn empty_output_honours_allow_flag(
    context: ExecutionContext,
    #[case] allow_empty: bool,
    #[case] expected: &str,
) {
    let executor = ScriptedExecutor::new(|_, _, _| Ok(String::new()));
    let pipeline = Pipeline::new(resolver(), executor);
    let formatter = if allow_empty {
        spec("blank").allow_empty_output()
    } else {
        spec("blank")
    };

    let result = pipeline.run(&sync_request(context, vec![formatter]), "keep me\n");

    assert_eq!(result.output(), Some(expected));
}

#[rstest]
fn formatter_without_range_args_sees_only_range_lines(context: ExecutionContext) {
    let executor = ScriptedExecutor::new(|_, input, _| Ok(input.to_uppercase()));
    let pipeline = Pipeline::new(resolver(), executor);
    let ranged = context.with_range(Range::lines(2, 3));

    let result = pipeline.run(
        &sync_request(ranged, vec![spec("upper")]),
        "one\ntwo\nthree\nfour\n",
    );

    assert_eq!(result.output(), Some("one\nTWO\nTHREE\nfour\n"));
    assert_eq!(
        pipeline.executor().calls(),
        vec![(String::from("upper"), String::from("two\nthree\n"))]
    );
}

#[rstest]
fn range_aware_formatter_sees_whole_text(context: ExecutionContext) {
    let executor = ScriptedExecutor::new(|_, input, _| Ok(input.replace("two", "TWO")));
    let pipeline = Pipeline::new(resolver(), executor);
    let ranged = context.with_range(Range::lines(2, 2));
    let formatter = spec("ranged").with_range_args(["--lines=2:2"]);

    let result = pipeline.run(&sync_request(ranged, vec![formatter]), "one\ntwo\n");

    assert_eq!(result.output(), Some("one\nTWO\n"));
    assert_eq!(
        pipeline.executor().calls(),
        vec![(String::from("ranged"), String::from("one\ntwo\n"))]
    );
}

#[rstest]
fn sync_mode_passes_remaining_deadline(context: ExecutionContext) {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|_, _, limits| {
            limits
                .timeout()
                .is_some_and(|timeout| timeout <= Duration::from_secs(5) && !timeout.is_zero())
        })
        .times(1)
        .returning(|_, input, _| Ok(ProcessOutput::new(input, "", Some(0))));
    let pipeline = Pipeline::new(resolver(), executor);

    let result = pipeline.run(&sync_request(context, vec![spec("one")]), "x");

    assert!(result.is_success());
}

#[rstest]
fn async_mode_has_no_deadline(context: ExecutionContext) {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|_, _, limits| limits.timeout().is_none() && limits.cancel().is_some())
        .times(1)
        .returning(|_, input, _| Ok(ProcessOutput::new(input, "", Some(0))));
    let pipeline = Pipeline::new(resolver(), executor);
    let request = PipelineRequest::new(context, vec![spec("one")], ExecutionMode::Async);

    let result = pipeline.run(&request, "x");

    assert_eq!(result.output(), Some("x"));
}

#[rstest]
fn exhausted_deadline_skips_later_stages(context: ExecutionContext) {
    let executor = ScriptedExecutor::new(|_, input, _| {
        thread::sleep(Duration::from_millis(80));
        Ok(input.to_owned())
    });
    let pipeline = Pipeline::new(resolver(), executor);
    let request = PipelineRequest::new(
        context,
        vec![spec("slow"), spec("never")],
        ExecutionMode::Sync {
            timeout: Duration::from_millis(40),
        },
    );

    let result = pipeline.run(&request, "x");

    assert_eq!(
        result.error().map(PipelineError::kind),
        Some(PipelineErrorKind::Timeout)
    );
    assert_eq!(result.attempted(), ["slow"]);
    assert_eq!(pipeline.executor().calls().len(), 1);
}

#[rstest]
fn cancelled_token_prevents_any_spawn(context: ExecutionContext) {
    let mut executor = MockExecutor::new();
    executor.expect_execute().times(0);
    let pipeline = Pipeline::new(resolver(), executor);
    let token = CancellationToken::new();
    token.cancel();

    let result = pipeline.run_with_token(&sync_request(context, vec![spec("a")]), "x", &token);

    assert_eq!(
        result.error().map(PipelineError::kind),
        Some(PipelineErrorKind::Cancelled)
    );
    assert!(result.output().is_none());
    assert!(result.attempted().is_empty());
}

#[rstest]
fn spawned_run_delivers_result_through_callback(context: ExecutionContext) {
    let executor = ScriptedExecutor::new(|_, input, _| Ok(format!("{input}!")));
    let pipeline = Arc::new(Pipeline::new(resolver(), executor));
    let request = PipelineRequest::new(context, vec![spec("a"), spec("b")], ExecutionMode::Async);
    let (sender, receiver) = mpsc::channel();

    let handle = pipeline
        .spawn(request, String::from("x"), move |result| {
            sender.send(result).expect("send result");
        })
        .expect("spawn worker");
    let result = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("callback result");
    handle.join().expect("worker exits cleanly");

    assert_eq!(result.output(), Some("x!!"));
    assert_eq!(result.attempted(), ["a", "b"]);
}

#[rstest]
fn cancelled_spawned_run_discards_output(context: ExecutionContext) {
    let (start_signal, started_rx) = mpsc::channel::<()>();
    let started_tx = Mutex::new(start_signal);
    let executor = ScriptedExecutor::new(move |name, _, limits| {
        started_tx
            .lock()
            .expect("start lock")
            .send(())
            .expect("signal start");
        while !limits.cancel().is_some_and(CancellationToken::is_cancelled) {
            thread::sleep(Duration::from_millis(5));
        }
        Err(ExecutionError::Cancelled {
            name: name.to_owned(),
        })
    });
    let pipeline = Arc::new(Pipeline::new(resolver(), executor));
    let request = PipelineRequest::new(context, vec![spec("slow"), spec("next")], ExecutionMode::Async);
    let (sender, receiver) = mpsc::channel();

    let handle = pipeline
        .spawn(request, String::from("x"), move |result| {
            sender.send(result).expect("send result");
        })
        .expect("spawn worker");
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("stage started");
    handle.cancel();
    let result = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("callback result");
    handle.join().expect("worker exits cleanly");

    assert!(result.output().is_none());
    assert_eq!(
        result.error().map(PipelineError::kind),
        Some(PipelineErrorKind::Cancelled)
    );
    assert_eq!(pipeline.executor().calls().len(), 1);
}
