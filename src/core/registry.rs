//! Formula registry.
//!
//! The registry is the in-memory index of every known formula. It owns the
//! formula records for the lifetime of the process and hands out shared
//! references to the graph builder and the scheduler.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::formula::Formula;
use crate::core::manifest::{load_formula, ManifestError, FORMULA_EXTENSION};
use crate::resolver::GraphError;
use crate::util::fs::glob_files;

/// Index of formulas keyed by name, preserving registration order.
#[derive(Debug, Default, Clone)]
pub struct FormulaRegistry {
    formulas: Vec<Formula>,
    by_name: HashMap<String, usize>,
}

impl FormulaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every formula file in `dir`, registering them in file-name order.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ManifestError::DirNotFound(dir.to_path_buf()).into());
        }

        let files = glob_files(dir, &[format!("*.{}", FORMULA_EXTENSION)])?;
        let mut registry = FormulaRegistry::new();
        for path in files {
            let formula = load_formula(&path)?;
            registry
                .register(formula)
                .with_context(|| format!("while loading {}", path.display()))?;
        }

        tracing::debug!(
            "loaded {} formula(s) from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }

    /// Register a formula. Fails if the name is already taken.
    pub fn register(&mut self, formula: Formula) -> Result<(), GraphError> {
        if self.by_name.contains_key(formula.name()) {
            return Err(GraphError::DuplicateName {
                name: formula.name().to_string(),
            });
        }

        self.by_name
            .insert(formula.name().to_string(), self.formulas.len());
        self.formulas.push(formula);
        Ok(())
    }

    /// Look up a formula by name.
    pub fn lookup(&self, name: &str) -> Result<&Formula, GraphError> {
        self.get(name).ok_or_else(|| GraphError::NotFound {
            name: name.to_string(),
            suggestions: self.similar_names(name),
        })
    }

    /// Look up a formula by name, returning `None` if absent.
    pub fn get(&self, name: &str) -> Option<&Formula> {
        self.by_name.get(name).map(|&i| &self.formulas[i])
    }

    /// Formula at a registration index.
    pub fn get_index(&self, index: usize) -> Option<&Formula> {
        self.formulas.get(index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registration index of a formula, used for deterministic ordering.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// All formulas in registration order.
    ///
    /// The returned iterator is cheap to clone, so callers can restart it.
    pub fn all(&self) -> std::slice::Iter<'_, Formula> {
        self.formulas.iter()
    }

    /// Formulas that declare a dependency on `name`, in registration order.
    pub fn dependents(&self, name: &str) -> Vec<&Formula> {
        self.formulas
            .iter()
            .filter(|f| f.dependencies().iter().any(|d| d.name() == name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Registered names within edit distance 2 of `name`.
    pub fn similar_names(&self, name: &str) -> Vec<String> {
        self.formulas
            .iter()
            .map(Formula::name)
            .filter(|candidate| edit_distance(candidate, name) <= 2)
            .map(str::to_string)
            .collect()
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut curr = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        prev = curr;
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Dependency;
    use tempfile::TempDir;

    fn registry_of(names: &[&str]) -> FormulaRegistry {
        let mut reg = FormulaRegistry::new();
        for name in names {
            reg.register(Formula::new(*name)).unwrap();
        }
        reg
    }

    #[test]
    fn test_register_and_lookup() {
        let reg = registry_of(&["cmake", "eigen"]);
        assert_eq!(reg.lookup("eigen").unwrap().name(), "eigen");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_duplicate_name() {
        let mut reg = registry_of(&["cmake"]);
        let err = reg.register(Formula::new("cmake")).unwrap_err();
        assert_eq!(err, GraphError::DuplicateName { name: "cmake".into() });
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_lookup_not_found_suggests() {
        let reg = registry_of(&["eigen", "boost"]);
        match reg.lookup("eigne").unwrap_err() {
            GraphError::NotFound { name, suggestions } => {
                assert_eq!(name, "eigne");
                assert_eq!(suggestions, vec!["eigen".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_all_is_restartable_and_ordered() {
        let reg = registry_of(&["qhull", "cmake", "vtk"]);
        let iter = reg.all();
        let first: Vec<_> = iter.clone().map(Formula::name).collect();
        let second: Vec<_> = iter.map(Formula::name).collect();
        assert_eq!(first, vec!["qhull", "cmake", "vtk"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_dependents() {
        let mut reg = FormulaRegistry::new();
        reg.register(Formula::new("cmake")).unwrap();
        reg.register(Formula::new("flann").with_dependency(Dependency::required("cmake")))
            .unwrap();
        reg.register(Formula::new("pcl").with_dependency(Dependency::optional("cmake")))
            .unwrap();
        reg.register(Formula::new("eigen")).unwrap();

        let names: Vec<_> = reg.dependents("cmake").into_iter().map(Formula::name).collect();
        assert_eq!(names, vec!["flann", "pcl"]);
        assert!(reg.dependents("eigen").is_empty());
    }

    #[test]
    fn test_load_dir_in_file_order() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.toml"), "name = \"b\"\n").unwrap();
        std::fs::write(tmp.path().join("a.toml"), "name = \"a\"\n").unwrap();
        std::fs::write(tmp.path().join("notes.md"), "# not a formula").unwrap();

        let reg = FormulaRegistry::load_dir(tmp.path()).unwrap();
        let names: Vec<_> = reg.all().map(Formula::name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_load_dir_duplicate() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.toml"), "name = \"same\"\n").unwrap();
        std::fs::write(tmp.path().join("b.toml"), "name = \"same\"\n").unwrap();

        let err = FormulaRegistry::load_dir(tmp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>(),
            Some(GraphError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_load_dir_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(FormulaRegistry::load_dir(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("eigen", "eigen"), 0);
        assert_eq!(edit_distance("eigen", "eigne"), 2);
        assert_eq!(edit_distance("", "abc"), 3);
    }
}
