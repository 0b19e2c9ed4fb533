//! Wave scheduling.
//!
//! A wave holds every formula whose dependencies all sit in earlier waves.
//! Formulas within a wave are independent of each other and may build in
//! parallel; waves run strictly in order.

use std::collections::HashMap;
use std::fmt;

use crate::resolver::{DependencyGraph, NodeIndex};

/// One scheduling generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    pub index: usize,
    /// Nodes in registration order
    pub nodes: Vec<NodeIndex>,
}

/// Ordered waves plus the worker bound they are executed with.
#[derive(Debug, Clone)]
pub struct Schedule {
    waves: Vec<Wave>,
    workers: usize,
}

impl Schedule {
    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Total number of jobs across all waves.
    pub fn job_count(&self) -> usize {
        self.waves.iter().map(|w| w.nodes.len()).sum()
    }

    /// Wave index of a node.
    pub fn wave_of(&self, node: NodeIndex) -> Option<usize> {
        self.waves
            .iter()
            .find(|w| w.nodes.contains(&node))
            .map(|w| w.index)
    }

    /// Render the plan with formula names, one wave per line.
    pub fn display<'a>(&'a self, graph: &'a DependencyGraph<'a>) -> ScheduleDisplay<'a> {
        ScheduleDisplay {
            schedule: self,
            graph,
        }
    }
}

/// Human-readable wave plan.
pub struct ScheduleDisplay<'a> {
    schedule: &'a Schedule,
    graph: &'a DependencyGraph<'a>,
}

impl fmt::Display for ScheduleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for wave in self.schedule.waves() {
            let names: Vec<&str> = wave.nodes.iter().map(|&n| self.graph.name(n)).collect();
            writeln!(f, "wave {}: {}", wave.index + 1, names.join(", "))?;
        }
        Ok(())
    }
}

/// Group the graph into waves.
///
/// A formula's wave is one past the latest wave of any dependency present in
/// the graph, optional or not. `workers` is clamped to at least one.
pub fn schedule(graph: &DependencyGraph<'_>, workers: usize) -> Schedule {
    let mut levels: HashMap<NodeIndex, usize> = HashMap::new();
    for node in graph.nodes() {
        level_of(graph, node, &mut levels);
    }

    let depth = levels.values().copied().max().map_or(0, |max| max + 1);
    let mut waves: Vec<Wave> = (0..depth)
        .map(|index| Wave {
            index,
            nodes: Vec::new(),
        })
        .collect();

    // graph.nodes() is in registration order, which is the in-wave tie-break.
    for node in graph.nodes() {
        waves[levels[&node]].nodes.push(node);
    }

    tracing::debug!(
        "scheduled {} formula(s) in {} wave(s)",
        graph.len(),
        waves.len()
    );

    Schedule {
        waves,
        workers: workers.max(1),
    }
}

/// Level of `root`, computed with an explicit post-order stack. A node is
/// revisited once every dependency has a level; the graph is acyclic.
fn level_of(
    graph: &DependencyGraph<'_>,
    root: NodeIndex,
    levels: &mut HashMap<NodeIndex, usize>,
) -> usize {
    let mut stack = vec![(root, false)];
    while let Some((node, deps_done)) = stack.pop() {
        if levels.contains_key(&node) {
            continue;
        }
        let deps = graph.dependencies(node);
        if deps_done {
            let level = deps
                .iter()
                .map(|(dep, _)| levels.get(dep).map_or(0, |l| l + 1))
                .max()
                .unwrap_or(0);
            levels.insert(node, level);
        } else {
            stack.push((node, true));
            stack.extend(
                deps.iter()
                    .filter(|(dep, _)| !levels.contains_key(dep))
                    .map(|&(dep, _)| (dep, false)),
            );
        }
    }
    levels.get(&root).copied().unwrap_or(0)
}

/// Worker count when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
