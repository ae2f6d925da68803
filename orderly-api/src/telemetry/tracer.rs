//! Tracing Subscriber Initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "orderly_api=debug,tower_http=info,info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Output format (`ORDERLY_LOG_FORMAT=json|text`)
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "orderly-api".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("ORDERLY_SERVICE_NAME").unwrap_or(defaults.service_name),
            format: std::env::var("ORDERLY_LOG_FORMAT")
                .ok()
                .map(|s| parse_format(&s))
                .unwrap_or(defaults.format),
            ..defaults
        }
    }
}

fn parse_format(value: &str) -> LogFormat {
    if value.eq_ignore_ascii_case("text") || value.eq_ignore_ascii_case("pretty") {
        LogFormat::Text
    } else {
        LogFormat::Json
    }
}

/// Install the global tracing subscriber.
///
/// Must be called once, before any other tracing occurs.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json_layer = (config.format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (config.format == LogFormat::Text).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        service_version = %config.service_version,
        format = ?config.format,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("json"), LogFormat::Json);
        assert_eq!(parse_format("TEXT"), LogFormat::Text);
        assert_eq!(parse_format("pretty"), LogFormat::Text);
        assert_eq!(parse_format("anything-else"), LogFormat::Json);
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
