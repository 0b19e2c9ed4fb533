//! Core data structures for Formulary.
//!
//! This module contains the records the engine consumes:
//! - Formulas and their recipe steps
//! - Dependency declarations
//! - The formula registry and formula file loading

pub mod dependency;
pub mod formula;
pub mod manifest;
pub mod registry;

pub use dependency::Dependency;
pub use formula::{Checksum, Formula, SourceLocator, Step, StepKind};
pub use manifest::{load_formula, parse_formula, ManifestError};
pub use registry::FormulaRegistry;
