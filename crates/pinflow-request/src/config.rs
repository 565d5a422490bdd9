//! Processor configuration from environment variables.

use std::env;

use serde::Serialize;

/// Class name given to items materialized without an owning activity.
pub const DEFAULT_PLACEHOLDER_ACTIVITY: &str = "pinflow.__placeholder__";

/// Processor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorConfig {
    /// Placeholder activity class for items created by a commit.
    pub placeholder_activity: String,
    /// Run the consistency self-check after every commit.
    pub verify_states: bool,
    /// Panic when the self-check fails instead of only logging.
    pub strict_verification: bool,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            placeholder_activity: DEFAULT_PLACEHOLDER_ACTIVITY.to_string(),
            verify_states: true,
            strict_verification: cfg!(debug_assertions),
            log_level: "info".to_string(),
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `PINFLOW_PLACEHOLDER_ACTIVITY`: placeholder class (default: "pinflow.__placeholder__")
    /// - `PINFLOW_VERIFY_STATES`: run the post-commit self-check (default: true)
    /// - `PINFLOW_STRICT_VERIFY`: panic on a failed self-check (default: debug builds only)
    /// - `PINFLOW_LOG_LEVEL`: logging level (default: "info")
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let placeholder_activity = match lookup("PINFLOW_PLACEHOLDER_ACTIVITY") {
            Some(class) if class.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    name: "PINFLOW_PLACEHOLDER_ACTIVITY".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            Some(class) => class,
            None => defaults.placeholder_activity,
        };

        let verify_states = parse_bool(&lookup, "PINFLOW_VERIFY_STATES")?
            .unwrap_or(defaults.verify_states);
        let strict_verification = parse_bool(&lookup, "PINFLOW_STRICT_VERIFY")?
            .unwrap_or(defaults.strict_verification);

        let log_level = lookup("PINFLOW_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            placeholder_activity,
            verify_states,
            strict_verification,
            log_level,
        })
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid environment variable value.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = ProcessorConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.placeholder_activity, DEFAULT_PLACEHOLDER_ACTIVITY);
        assert!(config.verify_states);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = ProcessorConfig::from_lookup(lookup(&[
            ("PINFLOW_PLACEHOLDER_ACTIVITY", "app.Placeholder"),
            ("PINFLOW_VERIFY_STATES", "off"),
            ("PINFLOW_STRICT_VERIFY", "1"),
            ("PINFLOW_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.placeholder_activity, "app.Placeholder");
        assert!(!config.verify_states);
        assert!(config.strict_verification);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_bool() {
        let err = ProcessorConfig::from_lookup(lookup(&[("PINFLOW_VERIFY_STATES", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("PINFLOW_VERIFY_STATES"));
    }

    #[test]
    fn test_empty_placeholder_rejected() {
        assert!(
            ProcessorConfig::from_lookup(lookup(&[("PINFLOW_PLACEHOLDER_ACTIVITY", " ")])).is_err()
        );
    }
}
