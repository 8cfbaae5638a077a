//! Structured logging setup.
//!
//! Plain or JSON output is chosen by the `[logging]` config section.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging from the `[logging]` config section.
///
/// `RUST_LOG` still takes precedence over `config.level`.
///
/// # Example
/// ```no_run
/// use vigil_core::config::LoggingConfig;
/// use vigil_core::logging;
///
/// logging::init_from_config(&LoggingConfig::default());
/// tracing::info!("Gateway started");
/// ```
pub fn init_from_config(config: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(filter(&config.level));
    if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}
