//! Formulary CLI - formula resolution and build orchestration

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use formulary::core::ManifestError;
use formulary::ops::exit_code_for_error;
use formulary::resolver::GraphError;
use formulary::util::diagnostic::emit;

mod cli;
mod commands;
mod signals;

use cli::{Cli, Commands};

fn main() {
    // Parse CLI
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if let Some(graph_err) = e.downcast_ref::<GraphError>() {
                emit(&graph_err.to_diagnostic(), color);
            } else if let Some(manifest_err) = e.downcast_ref::<ManifestError>() {
                emit(&manifest_err.to_diagnostic(), color);
            } else {
                eprintln!("error: {:#}", e);
            }
            std::process::exit(exit_code_for_error(&e));
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("formulary=debug")
    } else {
        EnvFilter::new("formulary=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = commands::Global {
        verbose: cli.verbose,
        formula_dir: cli.formula_dir,
    };

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(&global, args),
        Commands::List => commands::list::execute(&global).map(|_| 0),
        Commands::Deps(args) => commands::deps::execute(&global, args).map(|_| 0),
        Commands::Uses(args) => commands::uses::execute(&global, args).map(|_| 0),
        Commands::Cache(args) => commands::cache::execute(&global, args).map(|_| 0),
        Commands::Completions(args) => commands::completions::execute(args).map(|_| 0),
    }
}
