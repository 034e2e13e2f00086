// Logging initialization
//
// Components log through `tracing`; this module only installs a subscriber.
// Libraries embedding switchyard-core may install their own subscriber instead.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{ConfigError, EnvSource, Environment};

/// Output format of the console layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Configuration for logging
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Log filter (e.g., "info", "debug", "switchyard_core=debug")
    pub log_filter: Option<String>,
    /// Console output format
    pub format: LogFormat,
    /// Whether to include the event target
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "switchyard".to_string(),
            log_filter: None,
            format: LogFormat::Text,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SERVICE_NAME`: Service name (default: "switchyard")
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `LOG_FORMAT`: "json" or "text" (default: json in production, text otherwise)
    pub fn from_env() -> Self {
        Self::from_source(&EnvSource::new()).unwrap_or_default()
    }

    /// Create configuration from an explicit source
    pub fn from_source(source: &EnvSource) -> Result<Self, ConfigError> {
        let format = match source.get("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") if Environment::from_source(source).is_production() => {
                LogFormat::Json
            }
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: source.key("LOG_FORMAT"),
                    value: other.to_string(),
                    reason: "expected \"json\" or \"text\"".to_string(),
                })
            }
        };

        Ok(Self {
            service_name: source.string("SERVICE_NAME", "switchyard"),
            log_filter: source.get("RUST_LOG").or_else(|| source.get("LOG_LEVEL")),
            format,
            ..Default::default()
        })
    }

    /// Set the log filter
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Set the output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Install the global subscriber
///
/// Returns `false` when a subscriber was already installed (e.g. by a test
/// harness); the existing one is left untouched.
pub fn init_telemetry(config: TelemetryConfig) -> bool {
    let filter = config
        .log_filter
        .as_ref()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let console_layer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(config.with_target)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(config.with_target)
            .with_filter(filter)
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %config.service_name, format = ?config.format, "Logging initialized");
    }

    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "switchyard");
        assert!(config.log_filter.is_none());
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_from_source() {
        std::env::set_var("TEL_TEST_OK_SERVICE_NAME", "orders");
        std::env::set_var("TEL_TEST_OK_LOG_LEVEL", "debug");
        std::env::set_var("TEL_TEST_OK_LOG_FORMAT", "json");

        let config = TelemetryConfig::from_source(&EnvSource::with_prefix("TEL_TEST_OK")).unwrap();
        assert_eq!(config.service_name, "orders");
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_rust_log_wins_over_log_level() {
        std::env::set_var("TEL_TEST_PRIO_RUST_LOG", "switchyard_core=trace");
        std::env::set_var("TEL_TEST_PRIO_LOG_LEVEL", "warn");

        let config =
            TelemetryConfig::from_source(&EnvSource::with_prefix("TEL_TEST_PRIO")).unwrap();
        assert_eq!(config.log_filter.as_deref(), Some("switchyard_core=trace"));
    }

    #[test]
    fn test_production_defaults_to_json() {
        std::env::set_var("TEL_TEST_PROD_ENV", "production");
        let config =
            TelemetryConfig::from_source(&EnvSource::with_prefix("TEL_TEST_PROD")).unwrap();
        assert_eq!(config.format, LogFormat::Json);

        std::env::set_var("TEL_TEST_PROD_TEXT_ENV", "production");
        std::env::set_var("TEL_TEST_PROD_TEXT_LOG_FORMAT", "text");
        let config =
            TelemetryConfig::from_source(&EnvSource::with_prefix("TEL_TEST_PROD_TEXT")).unwrap();
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_invalid_format() {
        std::env::set_var("TEL_TEST_BAD_LOG_FORMAT", "xml");
        assert!(TelemetryConfig::from_source(&EnvSource::with_prefix("TEL_TEST_BAD")).is_err());
    }

    #[test]
    fn test_second_init_is_noop() {
        let _ = init_telemetry(TelemetryConfig::default());
        assert!(!init_telemetry(TelemetryConfig::default()));
    }
}
