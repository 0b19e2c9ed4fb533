//! Isolated build of a single formula.
//!
//! Each build gets a fresh scratch directory under the sandbox root. The
//! source is fetched and unpacked there, recipe steps run in order with the
//! dependency install paths injected into their environment, and the result
//! lands in the formula's install prefix under the cellar. The scratch
//! directory is a [`tempfile::TempDir`] and is removed when the build
//! returns, whatever the outcome.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::builder::fingerprint::{cache_key, install_path};
use crate::builder::job::{BuildJob, JobError, JobOutcome};
use crate::cache::{ArtifactCache, CacheEntry};
use crate::core::{Formula, Step};
use crate::sources::{unpack_source, Fetcher};
use crate::util::cancel::CancellationToken;
use crate::util::config::DEFAULT_OUTPUT_TAIL_LINES;
use crate::util::fs::{ensure_dir, is_inside, normalize_lexically, remove_dir_all_if_exists};
use crate::util::process::{CommandRunner, ProcessBuilder, RunError};

/// Paths and knobs shared by every sandbox of a run.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub cellar_dir: PathBuf,
    pub sandbox_dir: PathBuf,
    pub output_tail_lines: usize,
    /// Consult and populate the artifact cache
    pub use_cache: bool,
}

impl SandboxConfig {
    pub fn new(cellar_dir: impl Into<PathBuf>, sandbox_dir: impl Into<PathBuf>) -> Self {
        SandboxConfig {
            cellar_dir: cellar_dir.into(),
            sandbox_dir: sandbox_dir.into(),
            output_tail_lines: DEFAULT_OUTPUT_TAIL_LINES,
            use_cache: true,
        }
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_output_tail_lines(mut self, lines: usize) -> Self {
        self.output_tail_lines = lines;
        self
    }
}

/// Builds one formula at a time against the shared collaborators.
pub struct Sandbox<'a> {
    config: &'a SandboxConfig,
    fetcher: &'a dyn Fetcher,
    runner: &'a dyn CommandRunner,
    cache: &'a ArtifactCache,
    cancel: &'a CancellationToken,
}

/// A step that did not complete.
enum StepFailure {
    Cancelled,
    Failed {
        exit_code: Option<i32>,
        output: String,
    },
}

impl StepFailure {
    fn message(message: impl Into<String>) -> Self {
        StepFailure::Failed {
            exit_code: None,
            output: message.into(),
        }
    }

    fn into_build_error(self, step_index: usize) -> JobError {
        match self {
            StepFailure::Cancelled => JobError::Cancelled,
            StepFailure::Failed { exit_code, output } => JobError::BuildStepFailed {
                step_index,
                exit_code,
                output,
            },
        }
    }

    fn into_test_error(self) -> JobError {
        match self {
            StepFailure::Cancelled => JobError::Cancelled,
            StepFailure::Failed { exit_code, output } => {
                JobError::SelfTestFailed { exit_code, output }
            }
        }
    }
}

/// Expansion table for `{prefix}`, `{workdir}` and `{dep:<name>}`.
struct Placeholders<'p> {
    prefix: &'p Path,
    workdir: &'p Path,
    deps: &'p BTreeMap<String, PathBuf>,
}

impl Placeholders<'_> {
    /// Replace known placeholders in `input`. Unknown `{...}` text is kept
    /// verbatim; an unavailable dependency expands to the empty string.
    fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };

            let name = &after[..end];
            match self.lookup(name) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "prefix" => Some(self.prefix.to_string_lossy().into_owned()),
            "workdir" => Some(self.workdir.to_string_lossy().into_owned()),
            _ => name.strip_prefix("dep:").map(|dep| {
                self.deps
                    .get(dep)
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default()
            }),
        }
    }
}

impl<'a> Sandbox<'a> {
    pub fn new(
        config: &'a SandboxConfig,
        fetcher: &'a dyn Fetcher,
        runner: &'a dyn CommandRunner,
        cache: &'a ArtifactCache,
        cancel: &'a CancellationToken,
    ) -> Self {
        Sandbox {
            config,
            fetcher,
            runner,
            cache,
            cancel,
        }
    }

    /// Build `formula` for `job`, consulting the cache first.
    pub fn run(&self, formula: &Formula, job: &BuildJob) -> JobOutcome {
        let key = cache_key(formula, &job.options, &job.deps);
        let prefix = install_path(&self.config.cellar_dir, formula.name(), &key);

        if self.config.use_cache {
            if let Some(entry) = self.cache.lookup(&key) {
                tracing::info!("{} is up to date ({})", formula.display_name(), key.short());
                return JobOutcome::succeeded(entry.install_path.clone(), true);
            }
        }

        tracing::info!("building {}", formula.display_name());
        match self.build(formula, job, &prefix) {
            Ok(None) => {
                if self.config.use_cache {
                    self.cache
                        .store(CacheEntry::new(formula.name(), key, prefix.clone()));
                }
                JobOutcome::succeeded(prefix, false)
            }
            // Not cached, so the next run builds and tests it again.
            Ok(Some(err)) => {
                tracing::warn!("{}: {}", formula.name(), err);
                JobOutcome::self_test_failed(prefix, err)
            }
            Err(err) => {
                if let Err(e) = remove_dir_all_if_exists(&prefix) {
                    tracing::warn!("failed to clean up {}: {:#}", prefix.display(), e);
                }
                tracing::debug!("{} failed: {}", formula.name(), err);
                JobOutcome::failed(err)
            }
        }
    }

    /// Run the recipe. `Ok(Some(_))` means the build installed but the
    /// self-test failed.
    fn build(
        &self,
        formula: &Formula,
        job: &BuildJob,
        prefix: &Path,
    ) -> Result<Option<JobError>, JobError> {
        ensure_dir(&self.config.sandbox_dir).map_err(|e| JobError::io(format!("{:#}", e)))?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("formulary-{}-", formula.name()))
            .tempdir_in(&self.config.sandbox_dir)
            .map_err(JobError::io)?;

        self.check_cancelled()?;
        let source_root = self.prepare_source(formula, scratch.path())?;

        remove_dir_all_if_exists(prefix).map_err(|e| JobError::io(format!("{:#}", e)))?;
        std::fs::create_dir_all(prefix).map_err(JobError::io)?;

        let env = build_env(formula, job, prefix);
        let vars = Placeholders {
            prefix,
            workdir: &source_root,
            deps: &job.deps,
        };

        let mut cwd = source_root.clone();
        for (index, step) in formula.install_steps().iter().enumerate() {
            self.check_cancelled()?;
            tracing::debug!("{}: step {}: {}", formula.name(), index + 1, step);
            self.run_step(step, &mut cwd, scratch.path(), prefix, &vars, &env)
                .map_err(|f| f.into_build_error(index))?;
        }
        drop(scratch);

        let Some(test) = formula.test_step() else {
            return Ok(None);
        };

        self.check_cancelled()?;
        let test_dir = tempfile::Builder::new()
            .prefix(&format!("formulary-{}-test-", formula.name()))
            .tempdir_in(&self.config.sandbox_dir)
            .map_err(JobError::io)?;
        let test_vars = Placeholders {
            prefix,
            workdir: test_dir.path(),
            deps: &job.deps,
        };

        tracing::debug!("{}: self-test: {}", formula.name(), test);
        let mut test_cwd = test_dir.path().to_path_buf();
        match self.run_step(test, &mut test_cwd, test_dir.path(), prefix, &test_vars, &env) {
            Ok(()) => Ok(None),
            Err(StepFailure::Cancelled) => Err(JobError::Cancelled),
            Err(failure) => Ok(Some(failure.into_test_error())),
        }
    }

    fn check_cancelled(&self) -> Result<(), JobError> {
        if self.cancel.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Fetch, verify and unpack the source into `scratch/src`.
    fn prepare_source(&self, formula: &Formula, scratch: &Path) -> Result<PathBuf, JobError> {
        let src_dir = scratch.join("src");

        let Some(source) = formula.source() else {
            std::fs::create_dir_all(&src_dir).map_err(JobError::io)?;
            return Ok(src_dir);
        };

        tracing::debug!("fetching {}", source.url);
        let data = self.fetcher.fetch(&source.url)?;

        match (source.checksum.expected(), source.checksum.digest_of(&data)) {
            (Some(expected), Some(actual)) => {
                if actual != expected {
                    return Err(JobError::ChecksumMismatch {
                        expected: source.checksum.to_string(),
                        actual,
                    });
                }
            }
            _ => {
                tracing::debug!("{} declares no checksum; skipping verification", formula.name());
            }
        }

        unpack_source(&data, &src_dir, &source.file_name())
            .map_err(|e| JobError::io(format!("{:#}", e)))
    }

    fn run_step(
        &self,
        step: &Step,
        cwd: &mut PathBuf,
        sandbox: &Path,
        prefix: &Path,
        vars: &Placeholders<'_>,
        env: &BTreeMap<String, String>,
    ) -> Result<(), StepFailure> {
        match step {
            Step::ShellCommand(argv) => {
                let argv: Vec<String> = argv.iter().map(|a| vars.expand(a)).collect();
                let Some((program, args)) = argv.split_first() else {
                    return Err(StepFailure::message("empty command"));
                };

                let cmd = ProcessBuilder::new(program.as_str())
                    .args(args)
                    .envs(env)
                    .cwd(&*cwd);

                match self.runner.run(&cmd, self.cancel) {
                    Ok(output) if output.success() => Ok(()),
                    Ok(output) => Err(StepFailure::Failed {
                        exit_code: output.exit_code,
                        output: output_tail(&output.combined(), self.config.output_tail_lines),
                    }),
                    Err(RunError::Cancelled { .. }) => Err(StepFailure::Cancelled),
                    Err(err) => Err(StepFailure::message(err.to_string())),
                }
            }

            Step::Mkdir(path) => {
                let target = resolve(cwd, &vars.expand(&path.to_string_lossy()));
                if !is_inside(&target, sandbox) && !is_inside(&target, prefix) {
                    return Err(StepFailure::message(format!(
                        "mkdir target {} is outside the sandbox",
                        target.display()
                    )));
                }
                std::fs::create_dir_all(&target).map_err(|e| {
                    StepFailure::message(format!("failed to create {}: {}", target.display(), e))
                })
            }

            Step::Chdir(path) => {
                let target = resolve(cwd, &vars.expand(&path.to_string_lossy()));
                if !is_inside(&target, sandbox) {
                    return Err(StepFailure::message(format!(
                        "chdir target {} is outside the sandbox",
                        target.display()
                    )));
                }
                if !target.is_dir() {
                    return Err(StepFailure::message(format!(
                        "chdir target {} does not exist",
                        target.display()
                    )));
                }
                *cwd = target;
                Ok(())
            }
        }
    }
}

fn resolve(cwd: &Path, path: &str) -> PathBuf {
    normalize_lexically(&cwd.join(path))
}

/// Environment injected into every step of a build.
pub fn build_env(formula: &Formula, job: &BuildJob, prefix: &Path) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("PREFIX".to_string(), prefix.to_string_lossy().into_owned());
    env.insert("FORMULA_NAME".to_string(), formula.name().to_string());
    env.insert(
        "FORMULA_VERSION".to_string(),
        formula.version().unwrap_or_default().to_string(),
    );

    let options: Vec<&str> = job.options.iter().map(String::as_str).collect();
    env.insert("FORMULA_OPTIONS".to_string(), options.join(" "));

    let dep_paths: Vec<String> = job
        .deps
        .values()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    env.insert("FORMULA_DEP_PATHS".to_string(), dep_paths.join(":"));

    for (name, path) in &job.deps {
        env.insert(dep_env_var(name), path.to_string_lossy().into_owned());
    }
    for name in &job.absent {
        env.entry(dep_env_var(name)).or_default();
    }
    env
}

/// `<NAME>_PREFIX`, upper-cased with non-alphanumerics replaced by `_`.
pub fn dep_env_var(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_PREFIX", stem)
}

/// Last `lines` lines of `text`.
pub fn output_tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
