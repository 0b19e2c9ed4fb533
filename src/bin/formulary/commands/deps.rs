//! `formulary deps` command

use anyhow::Result;

use crate::cli::FormulaArgs;
use crate::commands::Global;
use formulary::ops::formulary_deps::dependencies;

pub fn execute(global: &Global, args: FormulaArgs) -> Result<()> {
    let ctx = global.context()?;
    let report = dependencies(&global.formula_dir(&ctx), &args.formula)?;
    print!("{}", report.render());
    Ok(())
}
