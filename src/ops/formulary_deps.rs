//! Implementation of `formulary deps` and `formulary uses`.

use std::path::Path;

use anyhow::Result;

use crate::builder::schedule::schedule;
use crate::core::{Formula, FormulaRegistry};
use crate::resolver::{DependencyGraph, OptionalPolicy};

/// Build order and degraded optionals for one formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    /// Formula names per wave, root last
    pub waves: Vec<Vec<String>>,
    /// `(formula, dependency)` pairs of absent optional dependencies
    pub absent: Vec<(String, String)>,
}

impl DependencyReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, wave) in self.waves.iter().enumerate() {
            out.push_str(&format!("wave {}: {}\n", i + 1, wave.join(", ")));
        }
        for (formula, dep) in &self.absent {
            out.push_str(&format!("absent: {} (optional for {})\n", dep, formula));
        }
        out
    }
}

/// Dependency waves of `name` against the formulas in `formula_dir`.
pub fn dependencies(formula_dir: &Path, name: &str) -> Result<DependencyReport> {
    let registry = FormulaRegistry::load_dir(formula_dir)?;
    let graph = DependencyGraph::build_for(&registry, &[name], OptionalPolicy::Ignore)?;
    let plan = schedule(&graph, 1);

    Ok(DependencyReport {
        waves: plan
            .waves()
            .iter()
            .map(|w| w.nodes.iter().map(|&n| graph.name(n).to_string()).collect())
            .collect(),
        absent: graph
            .absent()
            .iter()
            .map(|a| (a.formula.clone(), a.dependency.clone()))
            .collect(),
    })
}

/// Formulas that declare a dependency on `name`, with whether it is optional.
pub fn dependents(formula_dir: &Path, name: &str) -> Result<Vec<(String, bool)>> {
    let registry = FormulaRegistry::load_dir(formula_dir)?;
    registry.lookup(name)?;

    Ok(registry
        .dependents(name)
        .into_iter()
        .map(|f: &Formula| {
            let optional = f
                .dependencies()
                .iter()
                .any(|d| d.name() == name && d.is_optional());
            (f.name().to_string(), optional)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FormulaDir;

    fn pcl_dir() -> FormulaDir {
        let dir = FormulaDir::new();
        dir.add("cmake", "name = \"cmake\"\n")
            .add("boost", "name = \"boost\"\n")
            .add(
                "flann",
                "name = \"flann\"\ndependencies = [\"cmake\"]\n",
            )
            .add(
                "pcl",
                "name = \"pcl\"\ndependencies = [\"cmake\", \"boost\", \"flann\", { name = \"doxygen\", optional = true }]\n",
            );
        dir
    }

    #[test]
    fn test_dependencies_report() {
        let dir = pcl_dir();
        let report = dependencies(&dir.formula_dir(), "pcl").unwrap();
        assert_eq!(
            report.waves,
            vec![vec!["boost", "cmake"], vec!["flann"], vec!["pcl"]]
        );
        assert_eq!(report.absent, vec![("pcl".to_string(), "doxygen".to_string())]);
        assert!(report.render().contains("absent: doxygen (optional for pcl)"));
    }

    #[test]
    fn test_dependents() {
        let dir = pcl_dir();
        let users = dependents(&dir.formula_dir(), "cmake").unwrap();
        assert_eq!(
            users,
            vec![("flann".to_string(), false), ("pcl".to_string(), false)]
        );
        assert!(dependents(&dir.formula_dir(), "nope").is_err());
    }
}
