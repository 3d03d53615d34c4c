//! Crate-level integration and BDD tests.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::context::{DocumentId, ExecutionContext};
use crate::error::ExecutionError;
use crate::pipeline::{ExecutionMode, Pipeline, PipelineRequest};
use crate::process::{ExecLimits, FormatterExecutor, ProcessOutput};
use crate::registry::{FormatterRegistry, Slot};
use crate::resolver::ConfigResolver;
use crate::spec::{FormatterSpec, ResolvedFormatter};


/// Appends the formatter name to every line it sees.
struct TaggingExecutor;

impl FormatterExecutor for TaggingExecutor {
    fn execute(
        &self,
        formatter: &ResolvedFormatter,
        input: &str,
        _limits: &ExecLimits,
    ) -> Result<ProcessOutput, ExecutionError> {
        let tagged: String = input
            .lines()
            .map(|line| format!("{line} {}\n", formatter.name()))
            .collect();
        Ok(ProcessOutput::new(tagged, "", Some(0)))
    }
}

#[test]
fn registry_expansion_feeds_pipeline() {
    let binary = std::env::current_exe()
        .expect("current exe")
        .display()
        .to_string();
    let mut registry = FormatterRegistry::new();
    for name in ["isort", "ruff", "black"] {
        registry
            .register(FormatterSpec::new(name, binary.clone()))
            .expect("register");
    }
    let slots = [
        Slot::from("isort"),
        Slot::Alternation(vec![String::from("ruff"), String::from("black")]),
    ];
    let expansion = registry
        .expand(&slots, |spec| spec.name() != "ruff")
        .expect("expand");

    let pipeline = Pipeline::new(ConfigResolver::with_env(BTreeMap::new()), TaggingExecutor);
    let request = PipelineRequest::new(
        ExecutionContext::new(DocumentId::new(1), "/project/app.py"),
        expansion.into_formatters(),
        ExecutionMode::Sync {
            timeout: Duration::from_secs(1),
        },
    );
    let result = pipeline.run(&request, "import os\n");

    assert_eq!(result.output(), Some("import os isort black\n"));
    assert_eq!(result.attempted(), ["isort", "black"]);
}
