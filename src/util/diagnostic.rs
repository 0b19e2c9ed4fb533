//! User-facing error reports.
//!
//! Errors that stop a run before any build starts (graph construction and
//! formula loading) are rendered as a [`Diagnostic`]: a headline, the formula
//! file involved, context lines and numbered next steps.

use std::fmt;
use std::path::PathBuf;

/// Next steps shared by several diagnostics.
pub mod suggestions {
    pub const FORMULA_NOT_FOUND: &str = "Run `formulary list` to see registered formulas";

    pub const MISSING_DEPENDENCY: &str =
        "Add a formula file for it, or mark the dependency `optional = true`";

    pub const FIX_FORMULA_FILE: &str = "Fix the formula file, or move it out of the formula directory";
}

const RED: &str = "\x1b[1;31m";
const GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

/// An error report with optional location, context and suggestions.
#[derive(Debug, Clone, Default)]
pub struct Diagnostic {
    pub message: String,
    /// Formula file the error is about
    pub location: Option<PathBuf>,
    pub context: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            ..Diagnostic::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Render for the terminal, with ANSI colors if `color` is set.
    pub fn format(&self, color: bool) -> String {
        let paint = |code: &str, text: &str| {
            if color {
                format!("{code}{text}{RESET}")
            } else {
                text.to_string()
            }
        };

        let mut out = format!("{}: {}\n", paint(RED, "error"), self.message);
        if let Some(path) = &self.location {
            out.push_str(&format!("  --> {}\n", path.display()));
        }
        for line in &self.context {
            out.push_str(&format!("  = {}\n", line));
        }

        if !self.suggestions.is_empty() {
            out.push_str(&format!("\n{}: consider:\n", paint(GREEN, "help")));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
