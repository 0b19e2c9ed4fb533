//! `formulary build` command

use std::io::Write;

use anyhow::Result;

use crate::cli::{BuildArgs, MessageFormat};
use crate::commands::Global;
use crate::signals;
use formulary::builder::BuildEvent;
use formulary::ops::formulary_build::{build, BuildOptions, BuildResult, Collaborators};
use formulary::sources::DefaultFetcher;
use formulary::util::process::ProcessRunner;
use formulary::util::CancellationToken;

pub fn execute(global: &Global, args: BuildArgs) -> Result<i32> {
    let ctx = global.context()?;
    let config = ctx.config();

    // CLI flags override config
    let mut opts = BuildOptions::from_context(&ctx, args.formulas);
    opts.formula_dir = global.formula_dir(&ctx);
    if let Some(workers) = args.workers {
        opts.workers = workers;
    }
    if let Some(policy) = &args.optional_missing {
        opts.optional_policy = policy.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    }
    opts.use_cache = opts.use_cache && !args.no_cache;
    opts.dry_run = args.dry_run;

    let json = args.message_format == MessageFormat::Json;
    opts.progress = !json && !global.verbose;

    let fetcher = DefaultFetcher::new(config.net_timeout(), config.net.offline || args.offline)?;
    let runner = ProcessRunner::new();
    let cancel = CancellationToken::new();
    signals::cancel_on_interrupt(&cancel);

    let collaborators = Collaborators {
        fetcher: &fetcher,
        runner: &runner,
        cancel: &cancel,
    };

    let print_event = |event: &BuildEvent| {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", event.to_json());
    };
    let events: Option<&dyn Fn(&BuildEvent)> = if json { Some(&print_event) } else { None };

    let result = build(&opts, collaborators, events)?;
    match &result {
        BuildResult::Planned { plan } => print!("{}", plan),
        BuildResult::Finished {
            aggregator,
            elapsed,
        } => {
            if !json {
                eprint!("{}", aggregator.render());
                let verdict = if aggregator.overall_status().is_success() {
                    "Finished"
                } else {
                    "Failed"
                };
                eprintln!("{:>12} in {:.2}s", verdict, elapsed.as_secs_f64());
            }
        }
    }

    Ok(result.exit_code())
}
