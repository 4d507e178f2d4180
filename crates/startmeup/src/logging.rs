use startmeup_core::config::Environment;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the environment default.
pub fn init(environment: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(environment.default_log_level()));

    // A second init (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
