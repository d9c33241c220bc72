use tracing_subscriber::EnvFilter;

pub(crate) const LOG_ENV: &str = "CASEFLOW_LOG";

/// Pick the event filter: `--quiet` wins, then `CASEFLOW_LOG`, then the
/// config file, then `warn`.
pub(crate) fn filter(config_level: Option<&str>, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    EnvFilter::try_from_env(LOG_ENV)
        .ok()
        .or_else(|| config_level.and_then(|level| EnvFilter::try_new(level).ok()))
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

/// Install the stderr subscriber. Safe to call more than once.
pub(crate) fn init(config_level: Option<&str>, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(config_level, quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
