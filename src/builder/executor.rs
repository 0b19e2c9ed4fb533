//! Wave executor with progress reporting.
//!
//! Waves run in order. Within a wave every job whose dependencies are
//! available is handed to a bounded rayon pool; jobs whose required
//! dependencies failed are skipped without running.

use std::collections::HashMap;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::builder::events::BuildEvent;
use crate::builder::job::{BuildJob, JobError, JobOutcome};
use crate::builder::report::ResultAggregator;
use crate::builder::sandbox::Sandbox;
use crate::builder::schedule::{Schedule, Wave};
use crate::resolver::{DependencyGraph, NodeIndex, OptionalPolicy};
use crate::util::cancel::CancellationToken;

/// Runs a [`Schedule`] against a [`Sandbox`].
pub struct Executor<'a> {
    graph: &'a DependencyGraph<'a>,
    sandbox: &'a Sandbox<'a>,
    cancel: &'a CancellationToken,
    self_test_blocks_dependents: bool,
    progress: bool,
    events: Option<&'a dyn Fn(&BuildEvent)>,
}

impl<'a> Executor<'a> {
    pub fn new(
        graph: &'a DependencyGraph<'a>,
        sandbox: &'a Sandbox<'a>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Executor {
            graph,
            sandbox,
            cancel,
            self_test_blocks_dependents: false,
            progress: false,
            events: None,
        }
    }

    /// Treat a failed self-test as a failed dependency.
    pub fn self_test_blocks_dependents(mut self, blocks: bool) -> Self {
        self.self_test_blocks_dependents = blocks;
        self
    }

    /// Show a progress bar on stderr.
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Receive an event for every finished job.
    pub fn events(mut self, sink: &'a dyn Fn(&BuildEvent)) -> Self {
        self.events = Some(sink);
        self
    }

    /// Execute every wave and collect the outcomes.
    pub fn execute(&self, schedule: &Schedule) -> Result<ResultAggregator> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(schedule.workers())
            .thread_name(|i| format!("formulary-worker-{}", i))
            .build()
            .context("failed to create build worker pool")?;

        let mut aggregator = ResultAggregator::new();
        if self.graph.policy() == OptionalPolicy::Warn {
            for absent in self.graph.absent() {
                aggregator.note(absent.to_string());
                self.emit(&BuildEvent::note(absent.to_string()));
            }
        }

        let total = schedule.job_count();
        let pb = if self.progress && total > 1 {
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            let pb = ProgressBar::new(total as u64);
            pb.set_style(style);
            Some(pb)
        } else {
            None
        };

        let mut outcomes: HashMap<NodeIndex, JobOutcome> = HashMap::new();
        for wave in schedule.waves() {
            if let Some(pb) = &pb {
                pb.set_message(format!("wave {}/{}", wave.index + 1, schedule.len()));
            }

            let wave_outcomes = self.run_wave(&pool, wave, &outcomes);
            for node in &wave.nodes {
                let Some(outcome) = wave_outcomes.get(node) else {
                    continue;
                };
                let name = self.graph.name(*node);
                self.emit(&BuildEvent::job(name, outcome));
                aggregator.record(name, self.graph.is_required(*node), outcome.clone());
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
            }
            outcomes.extend(wave_outcomes);
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        Ok(aggregator)
    }

    fn run_wave(
        &self,
        pool: &rayon::ThreadPool,
        wave: &Wave,
        done: &HashMap<NodeIndex, JobOutcome>,
    ) -> HashMap<NodeIndex, JobOutcome> {
        let mut outcomes = HashMap::new();
        let mut ready = Vec::new();

        for &node in &wave.nodes {
            if self.cancel.is_cancelled() {
                outcomes.insert(node, JobOutcome::skipped(JobError::Cancelled));
                continue;
            }
            match self.prepare_job(node, done) {
                Ok(job) => ready.push(job),
                Err(outcome) => {
                    outcomes.insert(node, outcome);
                }
            }
        }

        // The event sink is not Sync, so workers only see these.
        let (graph, sandbox, cancel) = (self.graph, self.sandbox, self.cancel);
        let built: Vec<(NodeIndex, JobOutcome)> = pool.install(|| {
            ready
                .par_iter()
                .map(|job| {
                    let outcome = if cancel.is_cancelled() {
                        JobOutcome::skipped(JobError::Cancelled)
                    } else {
                        sandbox.run(graph.formula(job.node), job)
                    };
                    (job.node, outcome)
                })
                .collect()
        });

        outcomes.extend(built);
        outcomes
    }

    /// Resolve a node's dependency paths, or the skip outcome if a required
    /// dependency is unavailable.
    fn prepare_job(
        &self,
        node: NodeIndex,
        done: &HashMap<NodeIndex, JobOutcome>,
    ) -> Result<BuildJob, JobOutcome> {
        let name = self.graph.name(node);
        let mut job = BuildJob::new(node, name);
        job.options = self.graph.requested_options(node);
        job.absent = self
            .graph
            .absent_for(name)
            .into_iter()
            .map(str::to_string)
            .collect();

        for (dep, edge) in self.graph.dependencies(node) {
            let dep_name = self.graph.name(dep);
            let available = done
                .get(&dep)
                .and_then(|o| o.installable(self.self_test_blocks_dependents));

            match available {
                Some(path) => {
                    job.deps.insert(dep_name.to_string(), path.to_path_buf());
                }
                None if edge.optional => {
                    tracing::warn!(
                        "optional dependency `{}` of `{}` did not build; building without it",
                        dep_name,
                        name
                    );
                    job.absent.push(dep_name.to_string());
                }
                None => {
                    tracing::info!("skipping {}: `{}` did not build", name, dep_name);
                    return Err(JobOutcome::skipped(JobError::DependencyFailed {
                        dep: dep_name.to_string(),
                    }));
                }
            }
        }

        Ok(job)
    }

    fn emit(&self, event: &BuildEvent) {
        if let Some(sink) = self.events {
            sink(event);
        }
    }
}
