//! Configuration file support for Formulary.
//!
//! Formulary reads two configuration files:
//! - Global: `~/.formulary/config.toml` - User-wide defaults
//! - Project: `.formulary/config.toml` - Overrides for the current directory
//!
//! Project config takes precedence over global config, and command-line flags
//! take precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::resolver::OptionalPolicy;

/// Default number of captured output lines shown for a failed step.
pub const DEFAULT_OUTPUT_TAIL_LINES: usize = 20;

/// Formulary configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Artifact cache settings
    pub cache: CacheConfig,

    /// Network settings
    pub net: NetConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory containing formula files
    pub formula_dir: Option<PathBuf>,

    /// Directory holding install prefixes of built formulas
    pub cellar_dir: Option<PathBuf>,

    /// Directory in which scratch sandboxes are created (system temp if unset)
    pub sandbox_dir: Option<PathBuf>,

    /// Default number of parallel build jobs (None = available parallelism)
    pub workers: Option<usize>,

    /// How an optional dependency missing from the registry is reported
    /// ("warn" or "ignore")
    pub optional_missing: Option<String>,

    /// Treat a failed self-test as fatal for dependents
    #[serde(default)]
    pub self_test_blocks_dependents: bool,

    /// Number of captured output lines shown for a failed step
    pub output_tail_lines: Option<usize>,
}

/// Artifact cache configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (defaults to `<home>/cache`)
    pub dir: Option<PathBuf>,

    /// Never read or write the artifact cache
    #[serde(default)]
    pub disabled: bool,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Source download timeout in seconds
    pub timeout: Option<u64>,

    /// Refuse network fetches; only `file://` locators work
    #[serde(default)]
    pub offline: bool,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or
    /// invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.formula_dir.is_some() {
            self.build.formula_dir = other.build.formula_dir;
        }
        if other.build.cellar_dir.is_some() {
            self.build.cellar_dir = other.build.cellar_dir;
        }
        if other.build.sandbox_dir.is_some() {
            self.build.sandbox_dir = other.build.sandbox_dir;
        }
        if other.build.workers.is_some() {
            self.build.workers = other.build.workers;
        }
        if other.build.optional_missing.is_some() {
            self.build.optional_missing = other.build.optional_missing;
        }
        if other.build.self_test_blocks_dependents {
            self.build.self_test_blocks_dependents = true;
        }
        if other.build.output_tail_lines.is_some() {
            self.build.output_tail_lines = other.build.output_tail_lines;
        }

        if other.cache.dir.is_some() {
            self.cache.dir = other.cache.dir;
        }
        if other.cache.disabled {
            self.cache.disabled = true;
        }

        if other.net.timeout.is_some() {
            self.net.timeout = other.net.timeout;
        }
        if other.net.offline {
            self.net.offline = true;
        }
    }

    /// Parse the optional-dependency policy, falling back to the default on
    /// unknown values.
    pub fn optional_policy(&self) -> OptionalPolicy {
        match self.build.optional_missing.as_deref() {
            None => OptionalPolicy::default(),
            Some(s) => s.parse().unwrap_or_else(|e| {
                tracing::warn!("{}; using default", e);
                OptionalPolicy::default()
            }),
        }
    }

    pub fn output_tail_lines(&self) -> usize {
        self.build
            .output_tail_lines
            .unwrap_or(DEFAULT_OUTPUT_TAIL_LINES)
    }

    pub fn net_timeout(&self) -> Option<Duration> {
        self.net.timeout.map(Duration::from_secs)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.formulary/config.toml)
/// 2. Global config (~/.formulary/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.build.workers.is_none());
        assert!(!config.build.self_test_blocks_dependents);
        assert!(!config.cache.disabled);
        assert_eq!(config.output_tail_lines(), DEFAULT_OUTPUT_TAIL_LINES);
        assert_eq!(config.optional_policy(), OptionalPolicy::Warn);
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[build]
workers = 8
optional_missing = "ignore"
self_test_blocks_dependents = true
output_tail_lines = 5

[cache]
dir = "/var/cache/formulary"

[net]
timeout = 30
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.build.workers, Some(8));
        assert_eq!(config.optional_policy(), OptionalPolicy::Ignore);
        assert!(config.build.self_test_blocks_dependents);
        assert_eq!(config.output_tail_lines(), 5);
        assert_eq!(config.cache.dir, Some(PathBuf::from("/var/cache/formulary")));
        assert_eq!(config.net_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.build.workers = Some(4);
        base.build.optional_missing = Some("warn".to_string());

        let mut override_cfg = Config::default();
        override_cfg.build.optional_missing = Some("ignore".to_string());
        override_cfg.cache.disabled = true;

        base.merge(override_cfg);

        assert_eq!(base.build.workers, Some(4));
        assert_eq!(base.optional_policy(), OptionalPolicy::Ignore);
        assert!(base.cache.disabled);
    }

    #[test]
    fn test_unknown_policy_falls_back() {
        let mut config = Config::default();
        config.build.optional_missing = Some("explode".to_string());
        assert_eq!(config.optional_policy(), OptionalPolicy::Warn);
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let project_path = tmp.path().join("project.toml");

        std::fs::write(&global_path, "[build]\nworkers = 2\noutput_tail_lines = 10\n").unwrap();
        std::fs::write(&project_path, "[build]\nworkers = 6\n").unwrap();

        let config = load_config(&global_path, &project_path);
        assert_eq!(config.build.workers, Some(6));
        assert_eq!(config.output_tail_lines(), 10);
    }

    #[test]
    fn test_invalid_config_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[build\nworkers = ").unwrap();

        let config = Config::load_or_default(&path);
        assert!(config.build.workers.is_none());
    }
}
