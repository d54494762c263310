//! # Structured Logging
//!
//! Subscriber setup for the `tracing` macros used across the crate. Log
//! lines carry structured fields (`service`, `instance_id`, `host`, `zone`,
//! `client_zone`, `strategy`) instead of formatted prose.

use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::observability::config::{LogConfig, LogFormat};

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level when set. A second call is
/// tolerated so tests and embedding applications can call it freely.
pub fn init_logging(config: &LogConfig) {
    let env_filter = build_filter(config);

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_names(true))
            .try_init(),
    };

    if result.is_err() {
        warn!("Tracing subscriber already initialized, skipping initialization");
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_tolerated() {
        let config = LogConfig {
            level: "debug".to_string(),
            format: LogFormat::Text,
        };
        init_logging(&config);
        init_logging(&config);
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn test_filter_follows_level_and_falls_back_to_info() {
        std::env::remove_var("RUST_LOG");

        let configured = LogConfig {
            level: "DEBUG".to_string(),
            format: LogFormat::Text,
        };
        assert_eq!(build_filter(&configured).to_string(), "debug");

        let unparsable = LogConfig {
            level: "very=loud=please".to_string(),
            format: LogFormat::Json,
        };
        assert_eq!(build_filter(&unparsable).to_string(), "info");
    }
}
