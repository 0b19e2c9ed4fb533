//! Dependency graph resolution.
//!
//! Turns the formula registry into an acyclic dependency graph. Graph
//! construction is pure: all formula files are read before it starts.

pub mod errors;
pub mod graph;

pub use errors::GraphError;
pub use graph::{AbsentDependency, DepEdge, DependencyGraph, GraphBuilder, OptionalPolicy};
pub use petgraph::graph::NodeIndex;
