//! Formatter descriptions and their dynamic fields.
//!
//! A [`FormatterSpec`] declares how to invoke one external formatter. Most
//! fields are [`Dynamic`]: either a fixed value or a function of the
//! [`ExecutionContext`], evaluated once per run by the
//! [`ConfigResolver`](crate::ConfigResolver).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::context::{ExecutionContext, find_root};

/// Function evaluated against a context to compute a field value.
pub type ContextFn<T> = Arc<dyn Fn(&ExecutionContext) -> T + Send + Sync>;

/// A configuration field that is either fixed or computed from the context.
pub enum Dynamic<T> {
    /// A fixed value.
    Static(T),
    /// A value computed from the execution context.
    Computed(ContextFn<T>),
}

impl<T> Dynamic<T> {
    /// Wraps a closure as a computed field.
    #[must_use]
    pub fn computed(f: impl Fn(&ExecutionContext) -> T + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }
}

impl<T: Clone> Dynamic<T> {
    /// Evaluates the field for `context`.
    #[must_use]
    pub fn resolve(&self, context: &ExecutionContext) -> T {
        match self {
            Self::Static(value) => value.clone(),
            Self::Computed(f) => f(context),
        }
    }
}

impl<T: Clone> Clone for Dynamic<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(value) => Self::Static(value.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for Dynamic<String> {
    fn from(value: &str) -> Self {
        Self::Static(value.to_owned())
    }
}

impl From<String> for Dynamic<String> {
    fn from(value: String) -> Self {
        Self::Static(value)
    }
}

impl From<Vec<String>> for Dynamic<Vec<String>> {
    fn from(value: Vec<String>) -> Self {
        Self::Static(value)
    }
}

impl From<&[&str]> for Dynamic<Vec<String>> {
    fn from(value: &[&str]) -> Self {
        Self::Static(value.iter().map(|arg| (*arg).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Dynamic<Vec<String>> {
    fn from(value: [&str; N]) -> Self {
        Self::Static(value.iter().map(|arg| (*arg).to_owned()).collect())
    }
}

impl From<PathBuf> for Dynamic<Option<PathBuf>> {
    fn from(value: PathBuf) -> Self {
        Self::Static(Some(value))
    }
}

impl From<BTreeMap<String, String>> for Dynamic<BTreeMap<String, String>> {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self::Static(value)
    }
}

impl From<bool> for Dynamic<bool> {
    fn from(value: bool) -> Self {
        Self::Static(value)
    }
}

/// Working-directory resolver that walks upward to the first directory
/// containing any of `markers`.
///
/// # Example
///
/// ```
/// use conform_runner::{FormatterSpec, spec::root_dir};
///
/// let spec = FormatterSpec::new("prettier", "prettier")
///     .with_cwd(root_dir(&[".prettierrc", "package.json"]))
///     .require_cwd();
/// assert!(spec.requires_cwd());
/// ```
#[must_use]
pub fn root_dir(markers: &[&str]) -> Dynamic<Option<PathBuf>> {
    let owned: Vec<String> = markers.iter().map(|marker| (*marker).to_owned()).collect();
    Dynamic::computed(move |context: &ExecutionContext| {
        let borrowed: Vec<&str> = owned.iter().map(String::as_str).collect();
        find_root(context.dirname(), &borrowed)
    })
}

/// Declarative description of one external formatter.
///
/// # Example
///
/// ```
/// use conform_runner::FormatterSpec;
///
/// let spec = FormatterSpec::new("black", "black")
///     .with_args(["--quiet", "-"])
///     .with_exit_codes([0, 1]);
///
/// assert_eq!(spec.name(), "black");
/// assert!(spec.uses_stdin());
/// assert!(spec.exit_codes().contains(&1));
/// ```
#[derive(Debug, Clone)]
pub struct FormatterSpec {
    name: String,
    command: Dynamic<String>,
    args: Dynamic<Vec<String>>,
    range_args: Option<Dynamic<Vec<String>>>,
    prepend_args: Vec<String>,
    cwd: Option<Dynamic<Option<PathBuf>>>,
    require_cwd: bool,
    env: Dynamic<BTreeMap<String, String>>,
    condition: Dynamic<bool>,
    exit_codes: BTreeSet<i32>,
    stdin: bool,
    allow_empty_output: bool,
}

impl FormatterSpec {
    /// Creates a spec with no arguments, success code `0`, and input via
    /// standard input.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<Dynamic<String>>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Dynamic::Static(Vec::new()),
            range_args: None,
            prepend_args: Vec::new(),
            cwd: None,
            require_cwd: false,
            env: Dynamic::Static(BTreeMap::new()),
            condition: Dynamic::Static(true),
            exit_codes: BTreeSet::from([0]),
            stdin: true,
            allow_empty_output: false,
        }
    }

    /// Sets the whole-buffer argument template.
    #[must_use]
    pub fn with_args(mut self, args: impl Into<Dynamic<Vec<String>>>) -> Self {
        self.args = args.into();
        self
    }

    /// Sets the argument template used when the request carries a range.
    #[must_use]
    pub fn with_range_args(mut self, args: impl Into<Dynamic<Vec<String>>>) -> Self {
        self.range_args = Some(args.into());
        self
    }

    /// Adds arguments placed before the resolved template.
    #[must_use]
    pub fn with_prepend_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prepend_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the working-directory resolver.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<Dynamic<Option<PathBuf>>>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Marks the formatter as unrunnable without a resolved working directory.
    #[must_use]
    pub const fn require_cwd(mut self) -> Self {
        self.require_cwd = true;
        self
    }

    /// Sets the environment resolver. Entries override inherited variables.
    #[must_use]
    pub fn with_env(mut self, env: impl Into<Dynamic<BTreeMap<String, String>>>) -> Self {
        self.env = env.into();
        self
    }

    /// Sets the applicability condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<Dynamic<bool>>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Replaces the set of exit codes treated as success.
    #[must_use]
    pub fn with_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.exit_codes = codes.into_iter().collect();
        self
    }

    /// Delivers input through a temporary file instead of standard input.
    ///
    /// The formatter rewrites the file named by `$FILENAME` in place and the
    /// rewritten content becomes the stage output.
    #[must_use]
    pub const fn without_stdin(mut self) -> Self {
        self.stdin = false;
        self
    }

    /// Accepts an empty output as a legitimate result.
    #[must_use]
    pub const fn allow_empty_output(mut self) -> Self {
        self.allow_empty_output = true;
        self
    }

    /// Formatter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command template.
    #[must_use]
    pub const fn command(&self) -> &Dynamic<String> {
        &self.command
    }

    /// Whole-buffer argument template.
    #[must_use]
    pub const fn args(&self) -> &Dynamic<Vec<String>> {
        &self.args
    }

    /// Range argument template, if the formatter is range-aware.
    #[must_use]
    pub const fn range_args(&self) -> Option<&Dynamic<Vec<String>>> {
        self.range_args.as_ref()
    }

    /// Arguments placed before the resolved template.
    #[must_use]
    pub fn prepend_args(&self) -> &[String] {
        &self.prepend_args
    }

    /// Working-directory resolver.
    #[must_use]
    pub const fn cwd(&self) -> Option<&Dynamic<Option<PathBuf>>> {
        self.cwd.as_ref()
    }

    /// Whether a resolved working directory is mandatory.
    #[must_use]
    pub const fn requires_cwd(&self) -> bool {
        self.require_cwd
    }

    /// Environment resolver.
    #[must_use]
    pub const fn env(&self) -> &Dynamic<BTreeMap<String, String>> {
        &self.env
    }

    /// Applicability condition.
    #[must_use]
    pub const fn condition(&self) -> &Dynamic<bool> {
        &self.condition
    }

    /// Exit codes treated as success.
    #[must_use]
    pub const fn exit_codes(&self) -> &BTreeSet<i32> {
        &self.exit_codes
    }

    /// Whether input is delivered through standard input.
    #[must_use]
    pub const fn uses_stdin(&self) -> bool {
        self.stdin
    }

    /// Whether an empty output is accepted as the formatted text.
    #[must_use]
    pub const fn allows_empty_output(&self) -> bool {
        self.allow_empty_output
    }
}

/// How a resolved formatter receives the text to format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Text is written to standard input; standard output is the result.
    Stdin,
    /// Text is written to a temporary file rewritten in place.
    TempFile,
}

/// A formatter with every dynamic field evaluated for one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFormatter {
    pub(crate) name: String,
    pub(crate) command: PathBuf,
    pub(crate) path: PathBuf,
    pub(crate) args: Vec<String>,
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) exit_codes: BTreeSet<i32>,
    pub(crate) input: InputMode,
    pub(crate) range_aware: bool,
    pub(crate) allow_empty_output: bool,
}

/// Placeholder replaced by the path handed to the formatter.
pub const FILENAME_VAR: &str = "$FILENAME";

impl ResolvedFormatter {
    /// Formatter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete executable path.
    #[must_use]
    pub const fn command(&self) -> &PathBuf {
        &self.command
    }

    /// Path of the document being formatted.
    #[must_use]
    pub const fn document_path(&self) -> &PathBuf {
        &self.path
    }

    /// Resolved arguments.
    ///
    /// In [`InputMode::TempFile`] the `$FILENAME` placeholder is still
    /// present; see [`ResolvedFormatter::args_for_file`].
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Arguments with `$FILENAME` replaced by `path`.
    #[must_use]
    pub fn args_for_file(&self, path: &std::path::Path) -> Vec<String> {
        let display = path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(FILENAME_VAR, &display))
            .collect()
    }

    /// Working directory, if any.
    #[must_use]
    pub const fn cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    /// Complete process environment.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Exit codes treated as success.
    #[must_use]
    pub const fn exit_codes(&self) -> &BTreeSet<i32> {
        &self.exit_codes
    }

    /// Returns true when `code` counts as success.
    #[must_use]
    pub fn is_success(&self, code: Option<i32>) -> bool {
        code.is_some_and(|value| self.exit_codes.contains(&value))
    }

    /// Input delivery mode.
    #[must_use]
    pub const fn input(&self) -> InputMode {
        self.input
    }

    /// Whether range arguments were used, meaning the formatter sees the
    /// whole document and restricts itself to the range.
    #[must_use]
    pub const fn is_range_aware(&self) -> bool {
        self.range_aware
    }

    /// Whether an empty output is accepted as the formatted text.
    #[must_use]
    pub const fn allows_empty_output(&self) -> bool {
        self.allow_empty_output
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ResolvedFormatter {
    /// Builds a resolved formatter directly, bypassing resolution.
    #[must_use]
    pub fn for_test(name: &str, command: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            command: PathBuf::from(command),
            path: std::env::temp_dir().join("conform-test.txt"),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            cwd: None,
            env: crate::resolver::inherited_env(),
            exit_codes: BTreeSet::from([0]),
            input: InputMode::Stdin,
            range_aware: false,
            allow_empty_output: false,
        }
    }

    /// Overrides the input mode.
    #[must_use]
    pub const fn with_input(mut self, input: InputMode) -> Self {
        self.input = input;
        self
    }

    /// Overrides the success exit codes.
    #[must_use]
    pub fn with_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.exit_codes = codes.into_iter().collect();
        self
    }
}
