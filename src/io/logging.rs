use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (`WBS_LOG=debug`,
/// `WBS_LOG=wbs::sync=trace`, ...)
pub const LOG_ENV: &str = "WBS_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Logs go to stderr so table and JSON output
/// on stdout stay clean. Calling this twice is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
