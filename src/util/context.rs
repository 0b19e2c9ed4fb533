//! Global context for Formulary operations.
//!
//! Provides centralized access to the directories a run reads from and
//! writes to, resolved from the environment and configuration.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};

use crate::util::config::{load_config, Config};

/// Environment variable overriding the Formulary home directory.
pub const HOME_ENV: &str = "FORMULARY_HOME";

/// Default formula directory, relative to the working directory.
pub const DEFAULT_FORMULA_DIR: &str = "Formula";

/// Project directories for Formulary
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "formulary", "formulary"));

/// Global context containing paths and configuration.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Formulary data
    home: PathBuf,

    /// Merged global + project configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext from the process environment.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_paths(cwd, default_home()))
    }

    /// Create a GlobalContext with explicit working and home directories.
    ///
    /// Configuration is the global file merged with the project file.
    pub fn with_paths(cwd: PathBuf, home: PathBuf) -> Self {
        let mut ctx = GlobalContext {
            cwd,
            home,
            config: Config::default(),
        };
        ctx.config = load_config(&ctx.config_path(), &ctx.project_dir().join("config.toml"));
        ctx
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the Formulary home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the project-local Formulary directory.
    pub fn project_dir(&self) -> PathBuf {
        self.cwd.join(".formulary")
    }

    /// Directory that formula files are loaded from.
    pub fn formula_dir(&self) -> PathBuf {
        match self.config.build.formula_dir {
            Some(ref dir) => self.resolve(dir),
            None => self.cwd.join(DEFAULT_FORMULA_DIR),
        }
    }

    /// Directory holding install prefixes.
    pub fn cellar_dir(&self) -> PathBuf {
        match self.config.build.cellar_dir {
            Some(ref dir) => self.resolve(dir),
            None => self.home.join("Cellar"),
        }
    }

    /// Directory holding persisted artifact cache entries.
    pub fn cache_dir(&self) -> PathBuf {
        match self.config.cache.dir {
            Some(ref dir) => self.resolve(dir),
            None => self.home.join("cache"),
        }
    }

    /// Directory scratch sandboxes are created in.
    pub fn sandbox_dir(&self) -> PathBuf {
        match self.config.build.sandbox_dir {
            Some(ref dir) => self.resolve(dir),
            None => std::env::temp_dir(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

fn default_home() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(home);
    }

    if let Some(dirs) = PROJECT_DIRS.as_ref() {
        dirs.data_dir().to_path_buf()
    } else {
        BaseDirs::new()
            .map(|b| b.home_dir().join(".formulary"))
            .unwrap_or_else(|| PathBuf::from(".formulary"))
    }
}
