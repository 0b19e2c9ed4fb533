//! Formulary - a formula resolution and build-orchestration engine
//!
//! This crate provides the core library functionality for Formulary:
//! loading formula records, building the dependency graph, scheduling
//! builds in waves, and running each build in an isolated sandbox backed by
//! an artifact cache.

pub mod builder;
pub mod cache;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Test utilities and mocks for Formulary unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides scripted implementations of the fetch and
/// subprocess collaborators plus formula fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{Dependency, Formula, FormulaRegistry, Step};
pub use resolver::{DependencyGraph, GraphError};
pub use util::context::GlobalContext;
