//! Implementation of `formulary build`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::builder::events::BuildEvent;
use crate::builder::executor::Executor;
use crate::builder::report::{OverallStatus, ResultAggregator};
use crate::builder::sandbox::{Sandbox, SandboxConfig};
use crate::builder::schedule::{default_workers, schedule};
use crate::cache::ArtifactCache;
use crate::core::FormulaRegistry;
use crate::resolver::{DependencyGraph, GraphError, OptionalPolicy};
use crate::sources::Fetcher;
use crate::util::cancel::CancellationToken;
use crate::util::config::DEFAULT_OUTPUT_TAIL_LINES;
use crate::util::process::CommandRunner;
use crate::util::GlobalContext;

/// Exit code for a run in which every required formula built.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a run in which a required formula failed or was skipped.
pub const EXIT_BUILD_FAILED: i32 = 1;
/// Exit code when the dependency graph could not be constructed.
pub const EXIT_GRAPH_ERROR: i32 = 2;

/// Options for the build command.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Formulas to build, with their dependency closure
    pub formulas: Vec<String>,

    pub formula_dir: PathBuf,
    pub cellar_dir: PathBuf,
    pub sandbox_dir: PathBuf,
    pub cache_dir: PathBuf,

    /// Number of concurrent build jobs
    pub workers: usize,

    /// Read and write the artifact cache
    pub use_cache: bool,

    /// Print the wave plan instead of building
    pub dry_run: bool,

    /// Show a progress bar
    pub progress: bool,

    pub optional_policy: OptionalPolicy,
    pub self_test_blocks_dependents: bool,
    pub output_tail_lines: usize,
}

impl BuildOptions {
    /// Options for `formulas` taken from the context's paths and config.
    pub fn from_context(ctx: &GlobalContext, formulas: Vec<String>) -> Self {
        let config = ctx.config();
        BuildOptions {
            formulas,
            formula_dir: ctx.formula_dir(),
            cellar_dir: ctx.cellar_dir(),
            sandbox_dir: ctx.sandbox_dir(),
            cache_dir: ctx.cache_dir(),
            workers: config.build.workers.unwrap_or_else(default_workers),
            use_cache: !config.cache.disabled,
            dry_run: false,
            progress: false,
            optional_policy: config.optional_policy(),
            self_test_blocks_dependents: config.build.self_test_blocks_dependents,
            output_tail_lines: config.output_tail_lines(),
        }
    }
}

/// External collaborators of a build run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub runner: &'a dyn CommandRunner,
    pub cancel: &'a CancellationToken,
}

/// What a build invocation produced.
#[derive(Debug)]
pub enum BuildResult {
    /// `--dry-run`: the rendered wave plan
    Planned { plan: String },

    /// Jobs ran to completion (or cancellation)
    Finished {
        aggregator: ResultAggregator,
        elapsed: Duration,
    },
}

impl BuildResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildResult::Planned { .. } => EXIT_SUCCESS,
            BuildResult::Finished { aggregator, .. } => match aggregator.overall_status() {
                OverallStatus::Succeeded => EXIT_SUCCESS,
                OverallStatus::Failed(_) => EXIT_BUILD_FAILED,
            },
        }
    }
}

/// Exit code for an error that aborted a run before any job started.
pub fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<GraphError>().is_some() {
        EXIT_GRAPH_ERROR
    } else {
        EXIT_BUILD_FAILED
    }
}

/// Build the requested formulas and everything they depend on.
pub fn build(
    opts: &BuildOptions,
    collaborators: Collaborators<'_>,
    events: Option<&dyn Fn(&BuildEvent)>,
) -> Result<BuildResult> {
    let start = Instant::now();

    let registry = FormulaRegistry::load_dir(&opts.formula_dir)?;
    let roots: Vec<&str> = opts.formulas.iter().map(String::as_str).collect();
    let graph = DependencyGraph::build_for(&registry, &roots, opts.optional_policy)?;
    let plan = schedule(&graph, opts.workers);

    if opts.dry_run {
        return Ok(BuildResult::Planned {
            plan: plan.display(&graph).to_string(),
        });
    }

    let cache = if opts.use_cache {
        ArtifactCache::load(&opts.cache_dir)?
    } else {
        tracing::debug!("artifact cache disabled for this run");
        ArtifactCache::in_memory()
    };

    let sandbox_config = SandboxConfig::new(&opts.cellar_dir, &opts.sandbox_dir)
        .with_cache(opts.use_cache)
        .with_output_tail_lines(opts.output_tail_lines);
    let sandbox = Sandbox::new(
        &sandbox_config,
        collaborators.fetcher,
        collaborators.runner,
        &cache,
        collaborators.cancel,
    );

    if let Some(sink) = events {
        sink(&BuildEvent::started(graph.len(), plan.len(), plan.workers()));
    }

    let mut executor = Executor::new(&graph, &sandbox, collaborators.cancel)
        .self_test_blocks_dependents(opts.self_test_blocks_dependents)
        .progress(opts.progress);
    if let Some(sink) = events {
        executor = executor.events(sink);
    }
    let aggregator = executor.execute(&plan)?;

    if opts.use_cache {
        cache.flush()?;
    }

    let elapsed = start.elapsed();
    if let Some(sink) = events {
        sink(&BuildEvent::finished(
            aggregator.overall_status().is_success(),
            elapsed.as_millis() as u64,
            aggregator.counts(),
        ));
    }

    Ok(BuildResult::Finished {
        aggregator,
        elapsed,
    })
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            formulas: Vec::new(),
            formula_dir: PathBuf::from("Formula"),
            cellar_dir: PathBuf::from("Cellar"),
            sandbox_dir: std::env::temp_dir(),
            cache_dir: PathBuf::from("cache"),
            workers: default_workers(),
            use_cache: true,
            dry_run: false,
            progress: false,
            optional_policy: OptionalPolicy::default(),
            self_test_blocks_dependents: false,
            output_tail_lines: DEFAULT_OUTPUT_TAIL_LINES,
        }
    }
}
