//! SIGINT/SIGTERM handling.
//!
//! The first signal cancels the run so in-flight steps are terminated and
//! the report is still printed. A second one exits immediately.

use formulary::util::CancellationToken;

/// Exit status after a second interrupt (128 + SIGINT).
#[cfg(unix)]
const FORCED_EXIT: i32 = 130;

/// Cancel `token` when the process receives SIGINT or SIGTERM.
#[cfg(unix)]
pub fn cancel_on_interrupt(token: &CancellationToken) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            tracing::warn!("could not install signal handlers: {}", e);
            return;
        }
    };

    let token = token.clone();
    std::thread::spawn(move || {
        for signal in signals.forever() {
            if token.is_cancelled() {
                tracing::warn!("interrupted again, exiting");
                std::process::exit(FORCED_EXIT);
            }
            tracing::warn!("received signal {}, cancelling remaining jobs", signal);
            token.cancel();
        }
    });
}

#[cfg(not(unix))]
pub fn cancel_on_interrupt(_token: &CancellationToken) {}
