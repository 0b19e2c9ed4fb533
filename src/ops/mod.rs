//! High-level operations.
//!
//! This module contains the implementation of Formulary commands.

pub mod formulary_build;
pub mod formulary_cache;
pub mod formulary_deps;

pub use formulary_build::{
    build, exit_code_for_error, BuildOptions, BuildResult, Collaborators, EXIT_BUILD_FAILED,
    EXIT_GRAPH_ERROR, EXIT_SUCCESS,
};
pub use formulary_cache::{invalidate, list_entries};
pub use formulary_deps::{dependencies, dependents, DependencyReport};
