//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::types::settings::LoggingSettings;

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
///
/// Calling it twice is harmless: the second install is ignored.
pub fn init(settings: &LoggingSettings) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let fmt_layer = if settings.json {
        fmt::layer().json().with_current_span(false).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!(level = %settings.level, json = settings.json, "logging initialized");
    }
}
