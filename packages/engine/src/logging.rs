//! Tracing setup for front ends.
//!
//! The engine only emits events; binaries decide where they go.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive list.
pub const LOG_ENV: &str = "MEND_LOG";

const DEFAULT_DIRECTIVES: &str = "mend_engine=info,mend=info";
const VERBOSE_DIRECTIVES: [&str; 2] = ["mend_engine=debug", "mend=debug"];

/// Install a stderr subscriber. `verbose` raises the engine to `debug` on top
/// of whatever `MEND_LOG` says. Calling this twice is harmless.
pub fn init_logging(verbose: bool) {
    let mut filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    if verbose {
        for directive in VERBOSE_DIRECTIVES {
            if let Ok(directive) = directive.parse::<Directive>() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
