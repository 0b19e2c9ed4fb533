//! Dependency graph construction.
//!
//! The graph has one node per formula taking part in a run and an edge
//! `A -> B` whenever A declares a dependency on B, i.e. B must be built
//! first. Once [`GraphBuilder::finish`] succeeds the graph is known to be
//! acyclic and is never mutated again.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::core::{Formula, FormulaRegistry};
use crate::resolver::errors::GraphError;

/// How an optional dependency with no formula is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionalPolicy {
    /// Log a warning and list it in the final report
    #[default]
    Warn,
    /// Degrade silently (debug log only)
    Ignore,
}

impl FromStr for OptionalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(OptionalPolicy::Warn),
            "ignore" => Ok(OptionalPolicy::Ignore),
            _ => Err(format!(
                "invalid optional dependency policy '{}'; expected 'warn' or 'ignore'",
                s
            )),
        }
    }
}

/// Edge payload: how the dependent declared the dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepEdge {
    pub optional: bool,
    pub options: BTreeSet<String>,
}

/// An optional dependency that did not resolve to any formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsentDependency {
    pub formula: String,
    pub dependency: String,
}

impl fmt::Display for AbsentDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "optional dependency `{}` of `{}` is absent",
            self.dependency, self.formula
        )
    }
}

/// Immutable, acyclic dependency graph over registered formulas.
#[derive(Debug)]
pub struct DependencyGraph<'r> {
    registry: &'r FormulaRegistry,
    graph: DiGraph<usize, DepEdge>,
    nodes: HashMap<usize, NodeIndex>,
    absent: Vec<AbsentDependency>,
    required: HashSet<NodeIndex>,
    policy: OptionalPolicy,
}

impl<'r> DependencyGraph<'r> {
    /// Build the graph over every registered formula.
    ///
    /// Every formula counts as required.
    pub fn build(
        registry: &'r FormulaRegistry,
        policy: OptionalPolicy,
    ) -> Result<Self, GraphError> {
        let mut builder = GraphBuilder::new(registry, policy);
        for formula in registry.all() {
            builder.add(formula.name())?;
        }
        builder.finish()
    }

    /// Build the graph for `roots` and their transitive dependencies only.
    ///
    /// Formulas outside that closure are not inspected, so a broken formula
    /// elsewhere in the registry does not block an unrelated build.
    pub fn build_for(
        registry: &'r FormulaRegistry,
        roots: &[&str],
        policy: OptionalPolicy,
    ) -> Result<Self, GraphError> {
        let mut builder = GraphBuilder::new(registry, policy);
        for root in roots {
            builder.add(root)?;
        }
        builder.finish()
    }

    pub fn registry(&self) -> &'r FormulaRegistry {
        self.registry
    }

    pub fn policy(&self) -> OptionalPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Node indices in registration order.
    pub fn nodes(&self) -> Vec<NodeIndex> {
        let mut nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        nodes.sort_by_key(|&n| self.graph[n]);
        nodes
    }

    /// Node for a formula name, if it is part of this graph.
    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.registry
            .position(name)
            .and_then(|pos| self.nodes.get(&pos).copied())
    }

    pub fn formula(&self, node: NodeIndex) -> &'r Formula {
        self.registry
            .get_index(self.graph[node])
            .expect("graph nodes always refer to registered formulas")
    }

    pub fn name(&self, node: NodeIndex) -> &'r str {
        self.formula(node).name()
    }

    /// Direct dependencies of `node` in declaration order.
    pub fn dependencies(&self, node: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        outgoing(&self.graph, node)
    }

    /// Formulas in this graph that depend directly on `node`, in registration order.
    pub fn dependents(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut nodes: Vec<_> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        nodes.sort_by_key(|&n| self.graph[n]);
        nodes.dedup();
        nodes
    }

    /// Union of the build options every dependent requested of `node`.
    pub fn requested_options(&self, node: NodeIndex) -> BTreeSet<String> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .flat_map(|e| e.weight().options.iter().cloned())
            .collect()
    }

    /// Whether a failure of `node` fails the run as a whole.
    ///
    /// Roots and everything they reach through required edges are required;
    /// formulas pulled in only through optional declarations are not.
    pub fn is_required(&self, node: NodeIndex) -> bool {
        self.required.contains(&node)
    }

    /// Optional dependencies that resolved to no formula.
    pub fn absent(&self) -> &[AbsentDependency] {
        &self.absent
    }

    /// Absent optional dependency names of one formula.
    pub fn absent_for(&self, name: &str) -> Vec<&str> {
        self.absent
            .iter()
            .filter(|a| a.formula == name)
            .map(|a| a.dependency.as_str())
            .collect()
    }
}

/// Outgoing edges of `node` in insertion (declaration) order.
fn outgoing(graph: &DiGraph<usize, DepEdge>, node: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
    let mut edges: Vec<_> = graph
        .edges_directed(node, Direction::Outgoing)
        .map(|e| (e.id(), e.target(), e.weight()))
        .collect();
    edges.sort_by_key(|(id, _, _)| *id);
    edges.into_iter().map(|(_, t, w)| (t, w)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Incremental graph construction.
///
/// Formulas are added by name and their dependencies are pulled in
/// transitively. Resolution errors surface from [`add`](Self::add); cycle
/// detection runs once in [`finish`](Self::finish).
pub struct GraphBuilder<'r> {
    registry: &'r FormulaRegistry,
    graph: DiGraph<usize, DepEdge>,
    nodes: HashMap<usize, NodeIndex>,
    expanded: HashSet<usize>,
    roots: Vec<NodeIndex>,
    absent: Vec<AbsentDependency>,
    policy: OptionalPolicy,
}

impl<'r> GraphBuilder<'r> {
    pub fn new(registry: &'r FormulaRegistry, policy: OptionalPolicy) -> Self {
        GraphBuilder {
            registry,
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            expanded: HashSet::new(),
            roots: Vec::new(),
            absent: Vec::new(),
            policy,
        }
    }

    /// Add a formula and its dependency closure as a root of the run.
    pub fn add(&mut self, name: &str) -> Result<NodeIndex, GraphError> {
        let registry = self.registry;
        let root_pos = registry
            .position(name)
            .ok_or_else(|| GraphError::NotFound {
                name: name.to_string(),
                suggestions: registry.similar_names(name),
            })?;
        let root = self.node_at(root_pos);
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }

        let mut pending = vec![root_pos];
        while let Some(pos) = pending.pop() {
            if !self.expanded.insert(pos) {
                continue;
            }
            let from = self.node_at(pos);
            let Some(formula) = registry.get_index(pos) else {
                continue;
            };

            for dep in formula.dependencies() {
                let Some(dep_pos) = registry.position(dep.name()) else {
                    if dep.is_optional() {
                        self.record_absent(formula.name(), dep.name());
                        continue;
                    }
                    return Err(GraphError::UnresolvedDependency {
                        formula: formula.name().to_string(),
                        dependency: dep.name().to_string(),
                    });
                };

                let to = self.node_at(dep_pos);
                self.graph.add_edge(
                    from,
                    to,
                    DepEdge {
                        optional: dep.is_optional(),
                        options: dep.options().clone(),
                    },
                );
                pending.push(dep_pos);
            }
        }

        Ok(root)
    }

    /// Validate acyclicity and freeze the graph.
    pub fn finish(self) -> Result<DependencyGraph<'r>, GraphError> {
        if let Some(cycle) = self.find_cycle() {
            let names = cycle
                .into_iter()
                .filter_map(|n| self.registry.get_index(self.graph[n]))
                .map(|f| f.name().to_string())
                .collect();
            return Err(GraphError::CyclicDependency { cycle: names });
        }

        let required = self.required_closure();
        Ok(DependencyGraph {
            registry: self.registry,
            graph: self.graph,
            nodes: self.nodes,
            absent: self.absent,
            required,
            policy: self.policy,
        })
    }

    fn node_at(&mut self, pos: usize) -> NodeIndex {
        *self
            .nodes
            .entry(pos)
            .or_insert_with(|| self.graph.add_node(pos))
    }

    fn record_absent(&mut self, formula: &str, dependency: &str) {
        match self.policy {
            OptionalPolicy::Warn => tracing::warn!(
                "optional dependency `{}` of `{}` has no formula; building without it",
                dependency,
                formula
            ),
            OptionalPolicy::Ignore => tracing::debug!(
                "optional dependency `{}` of `{}` is absent",
                dependency,
                formula
            ),
        }
        self.absent.push(AbsentDependency {
            formula: formula.to_string(),
            dependency: dependency.to_string(),
        });
    }

    /// Depth-first search tracking visiting/visited marks.
    ///
    /// Returns the nodes of the first cycle found, starting from the node
    /// that closes it, in dependency order.
    fn find_cycle(&self) -> Option<Vec<NodeIndex>> {
        let mut starts: Vec<NodeIndex> = self.graph.node_indices().collect();
        starts.sort_by_key(|&n| self.graph[n]);

        let mut marks = HashMap::new();
        for start in starts {
            if marks.contains_key(&start) {
                continue;
            }
            if let Some(cycle) = self.visit(start, &mut marks) {
                return Some(cycle);
            }
        }
        None
    }

    /// Iterative DFS from `start`. `path` is the chain of nodes currently
    /// marked visiting; `frames` holds the unexplored dependencies of each.
    fn visit(
        &self,
        start: NodeIndex,
        marks: &mut HashMap<NodeIndex, Mark>,
    ) -> Option<Vec<NodeIndex>> {
        marks.insert(start, Mark::Visiting);
        let mut path = vec![start];
        let mut frames = vec![self.dependency_nodes(start)];

        while let Some(frame) = frames.last_mut() {
            let Some(dep) = frame.next() else {
                frames.pop();
                if let Some(done) = path.pop() {
                    marks.insert(done, Mark::Visited);
                }
                continue;
            };

            match marks.get(&dep) {
                Some(Mark::Visiting) => {
                    let from = path.iter().position(|&n| n == dep).unwrap_or(0);
                    return Some(path[from..].to_vec());
                }
                Some(Mark::Visited) => {}
                None => {
                    marks.insert(dep, Mark::Visiting);
                    path.push(dep);
                    frames.push(self.dependency_nodes(dep));
                }
            }
        }
        None
    }

    fn dependency_nodes(&self, node: NodeIndex) -> std::vec::IntoIter<NodeIndex> {
        outgoing(&self.graph, node)
            .into_iter()
            .map(|(dep, _)| dep)
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn required_closure(&self) -> HashSet<NodeIndex> {
        let mut required: HashSet<NodeIndex> = self.roots.iter().copied().collect();
        let mut stack = self.roots.clone();
        while let Some(node) = stack.pop() {
            for (dep, edge) in outgoing(&self.graph, node) {
                if !edge.optional && required.insert(dep) {
                    stack.push(dep);
                }
            }
        }
        required
    }
}
