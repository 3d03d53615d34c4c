//! Resolution of formatter specs into runnable processes.
//!
//! [`ConfigResolver`] evaluates every dynamic field of a [`FormatterSpec`]
//! against an [`ExecutionContext`], in a fixed order: command, arguments,
//! working directory, environment, then the applicability condition. Any
//! failure marks the formatter unavailable for this run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::ResolutionError;
use crate::spec::{FILENAME_VAR, FormatterSpec, InputMode, ResolvedFormatter};

/// Tracing target for resolution.
const RESOLVER_TARGET: &str = "conform_runner::resolver";

/// Captures the current process environment, skipping non-UTF-8 entries.
#[must_use]
pub fn inherited_env() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Resolves formatter specs against execution contexts.
///
/// # Example
///
/// ```
/// use conform_runner::{ConfigResolver, DocumentId, ExecutionContext, FormatterSpec};
///
/// let resolver = ConfigResolver::from_process_env();
/// let context = ExecutionContext::new(DocumentId::new(1), "/tmp/example.txt");
/// let spec = FormatterSpec::new("cat", "cat").with_args(["-"]);
/// if let Ok(resolved) = resolver.resolve(&spec, &context) {
///     assert_eq!(resolved.args(), ["-"]);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    inherited: BTreeMap<String, String>,
}

impl ConfigResolver {
    /// Creates a resolver that inherits the current process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self {
            inherited: inherited_env(),
        }
    }

    /// Creates a resolver that inherits exactly `env`.
    #[must_use]
    pub const fn with_env(env: BTreeMap<String, String>) -> Self {
        Self { inherited: env }
    }

    /// Environment inherited by every formatter.
    #[must_use]
    pub const fn inherited(&self) -> &BTreeMap<String, String> {
        &self.inherited
    }

    /// Resolves `spec` for `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::CwdMissing`] when a mandatory working
    /// directory cannot be resolved, [`ResolutionError::CommandNotFound`]
    /// when the command cannot be located, and
    /// [`ResolutionError::ConditionFailed`] when the applicability condition
    /// is false.
    pub fn resolve(
        &self,
        spec: &FormatterSpec,
        context: &ExecutionContext,
    ) -> Result<ResolvedFormatter, ResolutionError> {
        let name = spec.name();
        let command = spec.command().resolve(context);

        let (template, range_aware) = match (context.range(), spec.range_args()) {
            (Some(_), Some(range_args)) => (range_args.resolve(context), true),
            _ => (spec.args().resolve(context), false),
        };
        let input = if spec.uses_stdin() {
            InputMode::Stdin
        } else {
            InputMode::TempFile
        };
        let args = substitute_args(spec.prepend_args(), &template, context, input);

        let cwd = spec.cwd().and_then(|resolver| resolver.resolve(context));
        if cwd.is_none() && spec.requires_cwd() {
            debug!(target: RESOLVER_TARGET, formatter = name, "required cwd missing");
            return Err(ResolutionError::CwdMissing {
                name: name.to_owned(),
            });
        }

        let mut env = self.inherited.clone();
        env.extend(spec.env().resolve(context));

        let executable = locate_command(&command, &env, cwd.as_deref().unwrap_or(context.dirname()))
            .ok_or_else(|| {
                debug!(target: RESOLVER_TARGET, formatter = name, %command, "command not found");
                ResolutionError::CommandNotFound {
                    name: name.to_owned(),
                    command: command.clone(),
                }
            })?;

        if !spec.condition().resolve(context) {
            debug!(target: RESOLVER_TARGET, formatter = name, "condition failed");
            return Err(ResolutionError::ConditionFailed {
                name: name.to_owned(),
            });
        }

        debug!(
            target: RESOLVER_TARGET,
            formatter = name,
            command = %executable.display(),
            ?args,
            range_aware,
            "formatter resolved"
        );

        Ok(ResolvedFormatter {
            name: name.to_owned(),
            command: executable,
            path: context.path().to_path_buf(),
            args,
            cwd,
            env,
            exit_codes: spec.exit_codes().clone(),
            input,
            range_aware,
            allow_empty_output: spec.allows_empty_output(),
        })
    }
}

/// Looks the command up on the resolved `PATH`, or accepts an executable
/// path. Relative paths with a directory part are taken from `cwd`.
fn locate_command(command: &str, env: &BTreeMap<String, String>, cwd: &Path) -> Option<PathBuf> {
    if command.trim().is_empty() {
        return None;
    }
    let candidate = Path::new(command);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        let path = cwd.join(candidate);
        return is_executable(&path).then_some(path);
    }
    let search = env.get("PATH")?;
    std::env::split_paths(search)
        .map(|dir| dir.join(command))
        .find(|path| is_executable(path))
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Expands template variables in the prepended and template arguments.
///
/// In [`InputMode::TempFile`] `$FILENAME` is left in place for the executor
/// to point at the temporary copy.
fn substitute_args(
    prepend: &[String],
    template: &[String],
    context: &ExecutionContext,
    input: InputMode,
) -> Vec<String> {
    let path = context.path();
    let filename = path.to_string_lossy();
    let dirname = context.dirname().to_string_lossy();
    let relative = relative_path(path);
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();

    prepend
        .iter()
        .chain(template)
        .map(|arg| {
            let expanded = arg
                .replace("$DIRNAME", &dirname)
                .replace("$RELATIVE_FILEPATH", &relative)
                .replace("$EXTENSION", &extension);
            match input {
                InputMode::Stdin => expanded.replace(FILENAME_VAR, &filename),
                InputMode::TempFile => expanded,
            }
        })
        .collect()
}

fn relative_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
