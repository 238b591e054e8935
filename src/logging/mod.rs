// Logging setup
//
// Logs go to stderr so stdout carries only the rendered reply. RUST_LOG
// takes precedence; otherwise -v flags raise the configured level.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Level directive for the given config and `-v` count
pub fn level_for(config: &LoggingConfig, verbosity: u8) -> String {
    match verbosity {
        0 => config.level.clone(),
        1 => "aula=debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(config: &LoggingConfig, verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(config, verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Subscriber for tests, captured by the test harness
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
