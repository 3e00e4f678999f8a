//! Logging setup.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. HTTP traffic and git invocations are
/// logged at debug level, which is only enabled through `HUB_VERBOSE`.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("hub=debug")
    } else {
        EnvFilter::new("warn")
    };

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }
}
