//! Dependency declarations.
//!
//! A Dependency names another formula, the build options requested of it,
//! and whether the dependent can do without it.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A dependency declaration inside a formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DependencySpec", into = "DetailedDependencySpec")]
pub struct Dependency {
    /// Formula name
    name: String,

    /// Build options passed through to the dependency, e.g. `enable-python`
    options: BTreeSet<String>,

    /// Whether the dependent can be built when this formula is unavailable
    optional: bool,
}

impl Dependency {
    /// Create a required dependency with no options.
    pub fn required(name: impl Into<String>) -> Self {
        Dependency {
            name: name.into(),
            options: BTreeSet::new(),
            optional: false,
        }
    }

    /// Create an optional dependency with no options.
    pub fn optional(name: impl Into<String>) -> Self {
        Dependency {
            optional: true,
            ..Self::required(name)
        }
    }

    /// Add a build option.
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.insert(option.into());
        self
    }

    /// Add several build options.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &BTreeSet<String> {
        &self.options
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.options.is_empty() {
            let opts: Vec<&str> = self.options.iter().map(String::as_str).collect();
            write!(f, "[{}]", opts.join(","))?;
        }
        if self.optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

/// Dependency declaration as it appears in a formula file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// Bare name: `dependencies = ["cmake"]`
    Simple(String),

    /// Detailed declaration
    Detailed(DetailedDependencySpec),
}

/// Detailed dependency declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedDependencySpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl From<DependencySpec> for Dependency {
    fn from(spec: DependencySpec) -> Self {
        match spec {
            DependencySpec::Simple(name) => Dependency::required(name),
            DependencySpec::Detailed(d) => Dependency {
                name: d.name,
                options: d.options.into_iter().collect(),
                optional: d.optional,
            },
        }
    }
}

impl From<Dependency> for DetailedDependencySpec {
    fn from(dep: Dependency) -> Self {
        DetailedDependencySpec {
            name: dep.name,
            options: dep.options.into_iter().collect(),
            optional: dep.optional,
        }
    }
}
