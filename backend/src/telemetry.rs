//! Telemetry initialization: tracing subscriber with text or JSON output.
//!
//! `RUST_LOG` takes precedence; otherwise the configured log level applies to
//! this crate and HTTP tracing, with sqlx query logging kept at `warn`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the default filter directive for a log level.
pub fn default_directive(log_level: &str) -> String {
    format!(
        "artifact_curator_backend={level},artifact_curator={level},tower_http={level},sqlx::query=warn",
        level = log_level
    )
}

/// Initialize the global tracing subscriber.
pub fn init_tracing(log_level: &str, log_format: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive(log_level).into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
