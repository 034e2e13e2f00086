//! Environment-variable configuration
//!
//! Every configurable component exposes `from_env()` (process environment, no
//! prefix) and `from_source(&EnvSource)` (explicit prefix, used by tests and by
//! services that namespace their variables).
//!
//! ```
//! use switchyard_core::config::EnvSource;
//!
//! // Reads ORDERS_POOL_MAX_WORKERS instead of POOL_MAX_WORKERS
//! let source = EnvSource::with_prefix("ORDERS");
//! assert_eq!(source.key("POOL_MAX_WORKERS"), "ORDERS_POOL_MAX_WORKERS");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Variable that selects the running environment
pub const ENV_KEY: &str = "ENV";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Variable is present but cannot be parsed into the expected type
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    /// Read the environment from `ENV`; unknown or missing values mean development
    pub fn current() -> Self {
        Self::from_source(&EnvSource::new())
    }

    /// Read the environment from `ENV` as seen through `source`
    pub fn from_source(source: &EnvSource) -> Self {
        source
            .get(ENV_KEY)
            .map(|v| Self::from_name(&v))
            .unwrap_or_default()
    }

    fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "testing" => Self::Testing,
            "staging" => Self::Staging,
            "production" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Testing => write!(f, "testing"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Typed view over environment variables, optionally namespaced by a prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSource {
    prefix: Option<String>,
}

impl EnvSource {
    /// Source without a prefix
    pub fn new() -> Self {
        Self::default()
    }

    /// Source whose keys are looked up as `PREFIX_KEY`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Full variable name for `key`
    pub fn key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Raw value, if set
    pub fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.key(key)).ok()
    }

    /// String value or `fallback` when unset
    pub fn string(&self, key: &str, fallback: &str) -> String {
        self.get(key).unwrap_or_else(|| fallback.to_string())
    }

    /// Parsed value or `fallback` when unset
    ///
    /// A value that is set but does not parse is an error rather than a silent
    /// fallback.
    pub fn parse<T>(&self, key: &str, fallback: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(fallback),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key: self.key(key),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Boolean value; accepts `true/false/1/0/yes/no` in any case
    pub fn flag(&self, key: &str, fallback: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(fallback),
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key: self.key(key),
                    value: raw,
                    reason: "expected a boolean".to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own prefix so parallel tests never share variables.

    #[test]
    fn test_key_without_prefix() {
        let source = EnvSource::new();
        assert_eq!(source.key("POOL_MAX_WORKERS"), "POOL_MAX_WORKERS");
        assert!(source.prefix().is_none());
    }

    #[test]
    fn test_empty_prefix_is_no_prefix() {
        let source = EnvSource::with_prefix("");
        assert_eq!(source, EnvSource::new());
    }

    #[test]
    fn test_parse_fallback_when_unset() {
        let source = EnvSource::with_prefix("CFG_TEST_UNSET");
        assert_eq!(source.parse("COUNT", 7usize).unwrap(), 7);
        assert_eq!(source.string("NAME", "fallback"), "fallback");
        assert!(source.flag("ENABLED", true).unwrap());
    }

    #[test]
    fn test_parse_reads_prefixed_value() {
        std::env::set_var("CFG_TEST_SET_COUNT", " 42 ");
        let source = EnvSource::with_prefix("CFG_TEST_SET");
        assert_eq!(source.parse("COUNT", 0usize).unwrap(), 42);
    }

    #[test]
    fn test_parse_invalid_value_is_error() {
        std::env::set_var("CFG_TEST_BAD_COUNT", "many");
        let source = EnvSource::with_prefix("CFG_TEST_BAD");
        let err = source.parse("COUNT", 0usize).unwrap_err();
        match err {
            ConfigError::Invalid { key, value, .. } => {
                assert_eq!(key, "CFG_TEST_BAD_COUNT");
                assert_eq!(value, "many");
            }
        }
    }

    #[test]
    fn test_flag_values() {
        std::env::set_var("CFG_TEST_FLAG_ON", "Yes");
        std::env::set_var("CFG_TEST_FLAG_OFF", "0");
        std::env::set_var("CFG_TEST_FLAG_BAD", "maybe");
        let source = EnvSource::with_prefix("CFG_TEST_FLAG");
        assert!(source.flag("ON", false).unwrap());
        assert!(!source.flag("OFF", true).unwrap());
        assert!(source.flag("BAD", true).is_err());
    }

    #[test]
    fn test_environment_names() {
        assert_eq!(Environment::from_name("production"), Environment::Production);
        assert_eq!(Environment::from_name("Staging"), Environment::Staging);
        assert_eq!(Environment::from_name("testing"), Environment::Testing);
        assert_eq!(Environment::from_name("qa"), Environment::Development);
        assert!(Environment::Production.is_production());
        assert_eq!(Environment::Staging.to_string(), "staging");
    }

    #[test]
    fn test_environment_from_source() {
        std::env::set_var("CFG_TEST_ENV_ENV", "production");
        let source = EnvSource::with_prefix("CFG_TEST_ENV");
        assert_eq!(Environment::from_source(&source), Environment::Production);

        let unset = EnvSource::with_prefix("CFG_TEST_NO_ENV");
        assert_eq!(Environment::from_source(&unset), Environment::Development);
    }
}
