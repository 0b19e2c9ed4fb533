//! `formulary uses` command

use anyhow::Result;

use crate::cli::FormulaArgs;
use crate::commands::Global;
use formulary::ops::formulary_deps::dependents;

pub fn execute(global: &Global, args: FormulaArgs) -> Result<()> {
    let ctx = global.context()?;
    let users = dependents(&global.formula_dir(&ctx), &args.formula)?;

    if users.is_empty() {
        eprintln!("No formulas depend on `{}`", args.formula);
        return Ok(());
    }

    for (name, optional) in users {
        if optional {
            println!("{} (optional)", name);
        } else {
            println!("{}", name);
        }
    }
    Ok(())
}
