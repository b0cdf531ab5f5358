use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global `fmt` subscriber for a calendar binary.
///
/// `RUST_LOG` takes precedence; otherwise `default_directive` is used with the
/// configured level substituted in, e.g. `"calendar_scheduler={level}"`.
pub fn init_tracing(logging: &LoggingConfig, default_directive: &str) {
    let fallback = default_directive.replace("{level}", &logging.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}
