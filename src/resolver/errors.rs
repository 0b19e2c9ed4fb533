//! Graph construction errors and their diagnostics.

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error while registering formulas or building the dependency graph.
///
/// All of these are fatal to a run and are reported before any build starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("formula `{name}` is already registered")]
    DuplicateName { name: String },

    #[error("formula not found: `{name}`")]
    NotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("`{formula}` depends on `{dependency}`, which has no formula")]
    UnresolvedDependency { formula: String, dependency: String },

    #[error("cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<String> },
}

fn format_cycle(cycle: &[String]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first);
    }
    parts.join(" -> ")
}

impl GraphError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            GraphError::DuplicateName { name } => {
                Diagnostic::error(format!("formula `{}` is defined more than once", name))
                    .with_suggestion("Rename or remove one of the formula files")
            }

            GraphError::NotFound {
                name,
                suggestions: similar,
            } => {
                let mut diag = Diagnostic::error(format!("no formula named `{}`", name));
                if !similar.is_empty() {
                    diag = diag.with_context(format!("similar names: {}", similar.join(", ")));
                }
                diag.with_suggestion(suggestions::FORMULA_NOT_FOUND)
            }

            GraphError::UnresolvedDependency {
                formula,
                dependency,
            } => Diagnostic::error(format!(
                "`{}` requires `{}`, which is not a known formula",
                formula, dependency
            ))
            .with_suggestion(suggestions::MISSING_DEPENDENCY),

            GraphError::CyclicDependency { cycle } => {
                Diagnostic::error("cyclic dependency between formulas")
                    .with_context(format!("cycle: {}", format_cycle(cycle)))
                    .with_suggestion("Remove one of the dependency declarations in the cycle")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_closes_loop() {
        let err = GraphError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> c -> a");
    }

    #[test]
    fn test_not_found_diagnostic_lists_suggestions() {
        let err = GraphError::NotFound {
            name: "eigne".into(),
            suggestions: vec!["eigen".into()],
        };
        let text = err.to_diagnostic().format(false);
        assert!(text.contains("no formula named `eigne`"));
        assert!(text.contains("similar names: eigen"));
    }
}
