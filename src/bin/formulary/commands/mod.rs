//! Command implementations

use std::path::PathBuf;

use anyhow::Result;

use formulary::util::GlobalContext;

pub mod build;
pub mod cache;
pub mod completions;
pub mod deps;
pub mod list;
pub mod uses;

/// Flags shared by every command.
pub struct Global {
    pub verbose: bool,
    pub formula_dir: Option<PathBuf>,
}

impl Global {
    pub fn context(&self) -> Result<GlobalContext> {
        GlobalContext::new()
    }

    /// Formula directory, with `--formula-dir` taking precedence.
    pub fn formula_dir(&self, ctx: &GlobalContext) -> PathBuf {
        match &self.formula_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => ctx.cwd().join(dir),
            None => ctx.formula_dir(),
        }
    }
}
