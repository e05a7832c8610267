//! Logging setup for the pool binary. No startup banner: a pool operator's
//! terminal is scripted far more often than a desktop node's.

use crate::args::LogArgs;
use eyre::Result;
use tracing_subscriber::EnvFilter;

/// Initialize logging based on command line arguments.
///
/// Precedence: `--quiet` forces error-only; otherwise `RUST_LOG` wins if
/// set, falling back to a level derived from `-v` count; `--log.filter`
/// directives are layered on top of either.
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = if args.quiet {
        EnvFilter::new("error")
    } else {
        let base_level = match args.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

        if let Some(custom_filter) = &args.filter {
            for directive in custom_filter.split(',') {
                if let Ok(d) = directive.parse() {
                    filter = filter.add_directive(d);
                }
            }
        }

        filter
    };

    tracing_subscriber::fmt().with_env_filter(filter).without_time().init();

    Ok(())
}
