//! Formula file loading.
//!
//! Formula files are TOML records, one formula per file, conventionally kept
//! in a `Formula/` directory and named `<formula>.toml`.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::formula::Formula;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// File extension of formula files.
pub const FORMULA_EXTENSION: &str = "toml";

/// Errors raised while reading formula files.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read formula file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse formula file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid formula in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("formula directory not found: {0}")]
    DirNotFound(PathBuf),
}

impl ManifestError {
    /// Convert to a user-friendly diagnostic pointing at the formula file.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ManifestError::Read { path, source } => {
                Diagnostic::error("failed to read formula file")
                    .with_location(path)
                    .with_context(source.to_string())
            }
            ManifestError::Parse { path, message } => {
                Diagnostic::error("formula file is not valid TOML for a formula")
                    .with_location(path)
                    .with_context(message.trim().to_string())
                    .with_suggestion(suggestions::FIX_FORMULA_FILE)
            }
            ManifestError::Invalid { path, reason } => Diagnostic::error("invalid formula")
                .with_location(path)
                .with_context(reason.clone())
                .with_suggestion(suggestions::FIX_FORMULA_FILE),
            ManifestError::DirNotFound(dir) => {
                Diagnostic::error("formula directory not found")
                    .with_location(dir)
                    .with_suggestion("Pass `--formula-dir`, or set `build.formula_dir` in config")
            }
        }
    }
}

/// Parse a formula from TOML text.
///
/// `path` is only used for error messages.
pub fn parse_formula(contents: &str, path: &Path) -> Result<Formula, ManifestError> {
    let formula: Formula = toml::from_str(contents).map_err(|e| ManifestError::Parse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    formula.validate().map_err(|reason| ManifestError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;

    Ok(formula)
}

/// Read and parse a formula file.
pub fn load_formula(path: &Path) -> Result<Formula, ManifestError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_formula(&contents, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_formula() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("eigen.toml");
        std::fs::write(
            &path,
            "name = \"eigen\"\nversion = \"3.4.0\"\ninstall = [{ run = [\"make\"] }]\n",
        )
        .unwrap();

        let formula = load_formula(&path).unwrap();
        assert_eq!(formula.name(), "eigen");
        assert_eq!(formula.version(), Some("3.4.0"));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let err = parse_formula("name = ", Path::new("Formula/bad.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
        assert!(err.to_string().contains("Formula/bad.toml"));
    }

    #[test]
    fn test_invalid_formula_diagnostic_points_at_file() {
        let err = parse_formula(
            "name = \"a\"\ndependencies = [\"b\", \"b\"]\n",
            Path::new("Formula/a.toml"),
        )
        .unwrap_err();
        let text = err.to_diagnostic().format(false);
        assert!(text.starts_with("error: invalid formula"));
        assert!(text.contains("--> Formula/a.toml"));
        assert!(text.contains("= dependency `b` declared more than once"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse_formula("name = \"a\"\nsha1 = \"\"\n", Path::new("a.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let err = parse_formula(
            "name = \"a\"\n[source]\nurl = \"https://example.com/a.tar.gz\"\nchecksum = \"md5:abc\"\n",
            Path::new("a.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported checksum algorithm"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = parse_formula("name = \"has space\"\n", Path::new("a.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { .. }));
    }
}
