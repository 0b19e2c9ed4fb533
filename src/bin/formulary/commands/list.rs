//! `formulary list` command

use anyhow::Result;

use crate::commands::Global;
use formulary::core::FormulaRegistry;

pub fn execute(global: &Global) -> Result<()> {
    let ctx = global.context()?;
    let registry = FormulaRegistry::load_dir(&global.formula_dir(&ctx))?;

    if registry.is_empty() {
        eprintln!("No formulas found");
        return Ok(());
    }

    for formula in registry.all() {
        match formula.description() {
            Some(desc) => println!("{} - {}", formula.display_name(), desc),
            None => println!("{}", formula.display_name()),
        }
        if global.verbose {
            if let Some(homepage) = formula.homepage() {
                println!("    {}", homepage);
            }
        }
    }

    Ok(())
}
