//! `formulary cache` command
//!
//! Inspect and prune the artifact cache.

use anyhow::Result;

use crate::cli::{CacheArgs, CacheCommands};
use crate::commands::Global;
use formulary::ops::formulary_cache::{invalidate, list_entries};

pub fn execute(global: &Global, args: CacheArgs) -> Result<()> {
    let ctx = global.context()?;
    let cache_dir = ctx.cache_dir();

    match args.command {
        CacheCommands::List => {
            let entries = list_entries(&cache_dir)?;
            if entries.is_empty() {
                eprintln!("Cache is empty");
            }
            for entry in entries {
                let state = if entry.is_live() { "" } else { " (stale)" };
                println!(
                    "{} {} -> {}{}",
                    entry.formula,
                    entry.key.short(),
                    entry.install_path.display(),
                    state
                );
            }
        }
        CacheCommands::Invalidate(args) => {
            let removed = invalidate(&cache_dir, &args.formula)?;
            let noun = if removed == 1 { "entry" } else { "entries" };
            eprintln!("     Removed {} {} for `{}`", removed, noun, args.formula);
        }
        CacheCommands::Path => println!("{}", cache_dir.display()),
    }

    Ok(())
}
