//! Test fixtures for common test scenarios.
//!
//! Pre-built registries and on-disk formula directories shared by the
//! resolver, builder and ops tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::{Dependency, Formula, FormulaRegistry, Step};

/// A step running `script` through `sh -c`.
pub fn sh(script: &str) -> Step {
    Step::run(["sh", "-c", script])
}

/// Register `formulas` in order.
pub fn registry_of(formulas: Vec<Formula>) -> FormulaRegistry {
    let mut registry = FormulaRegistry::new();
    for formula in formulas {
        registry
            .register(formula)
            .expect("fixture formulas have unique names");
    }
    registry
}

/// `a`, `b -> a`, `c -> a` plus an optional dependency on a formula that
/// does not exist.
pub fn fan_out_registry() -> FormulaRegistry {
    registry_of(vec![
        Formula::new("a").with_step(Step::run(["true"])),
        Formula::new("b")
            .with_dependency(Dependency::required("a"))
            .with_step(Step::run(["true"])),
        Formula::new("c")
            .with_dependency(Dependency::required("a"))
            .with_dependency(Dependency::optional("missing"))
            .with_step(Step::run(["true"])),
    ])
}

/// A temporary `Formula/` directory populated with TOML formula files.
pub struct FormulaDir {
    tmp: TempDir,
}

impl FormulaDir {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        std::fs::create_dir_all(tmp.path().join("Formula")).expect("create Formula dir");
        FormulaDir { tmp }
    }

    /// Write `Formula/<name>.toml`.
    pub fn add(&self, name: &str, contents: &str) -> &Self {
        std::fs::write(self.formula_dir().join(format!("{name}.toml")), contents)
            .expect("write formula file");
        self
    }

    /// Project root (parent of `Formula/`).
    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn formula_dir(&self) -> PathBuf {
        self.tmp.path().join("Formula")
    }
}

impl Default for FormulaDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_dir_loads() {
        let dir = FormulaDir::new();
        dir.add("a", "name = \"a\"\n").add("b", "name = \"b\"\ndependencies = [\"a\"]\n");

        let registry = FormulaRegistry::load_dir(&dir.formula_dir()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.dependents("a").len(), 1);
    }

    #[test]
    fn test_fan_out_registry_shape() {
        let registry = fan_out_registry();
        let names: Vec<_> = registry.all().map(Formula::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
