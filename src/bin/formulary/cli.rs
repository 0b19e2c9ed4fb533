//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Formulary - resolve formula dependencies and build them in parallel waves
#[derive(Parser)]
#[command(name = "formulary")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Directory containing formula files (defaults to ./Formula)
    #[arg(long, global = true, value_name = "DIR")]
    pub formula_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build formulas and their dependencies
    Build(BuildArgs),

    /// List registered formulas
    List,

    /// Show the build waves of a formula's dependencies
    Deps(FormulaArgs),

    /// Show formulas that depend on a formula
    Uses(FormulaArgs),

    /// Manage the artifact cache
    Cache(CacheArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Formulas to build
    #[arg(required = true)]
    pub formulas: Vec<String>,

    /// Number of parallel build jobs
    #[arg(short = 'j', long, alias = "jobs", value_name = "N")]
    pub workers: Option<usize>,

    /// Neither read nor write the artifact cache
    #[arg(long)]
    pub no_cache: bool,

    /// Print the build waves without building
    #[arg(long)]
    pub dry_run: bool,

    /// Refuse network fetches
    #[arg(long)]
    pub offline: bool,

    /// How absent optional dependencies are reported
    #[arg(long, value_name = "POLICY", value_parser = ["warn", "ignore"])]
    pub optional_missing: Option<String>,

    /// Output format for build results
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    /// Progress bar and a summary report
    Human,
    /// One JSON event per line on stdout
    Json,
}

#[derive(Args)]
pub struct FormulaArgs {
    /// Formula name
    pub formula: String,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cached artifacts
    List,

    /// Drop every cached artifact of a formula
    Invalidate(FormulaArgs),

    /// Show the cache directory
    Path,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
