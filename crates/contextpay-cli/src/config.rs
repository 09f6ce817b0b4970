//! Application configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional file
//! given on the command line, `config/default`, `config/local`, then
//! `CONTEXTPAY__*` environment variables (for example
//! `CONTEXTPAY__TRIGGER__COOLDOWN=5s`).

use std::path::PathBuf;

use anyhow::Context;
use contextpay_policy::PolicyConfig;
use contextpay_token::{TokenConfig, VerifierConfig};
use contextpay_trigger::TriggerConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub policy: PolicyConfig,
    pub trigger: TriggerConfig,
    pub token: TokenConfig,
    pub verifier: VerifierConfig,
    pub registry: RegistrySettings,
    pub logging: LoggingConfig,
}

/// Where the merchant whitelist comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Whitelist JSON file
    pub whitelist: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("CONTEXTPAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let app_config: AppConfig = builder
            .build()?
            .try_deserialize()
            .context("Invalid ContextPay configuration")?;

        Ok(app_config)
    }

    /// Collect every configuration problem
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.trigger.validate() {
            errors.append(&mut e);
        }
        if let Err(mut e) = self.token.validate() {
            errors.append(&mut e);
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!("Unknown log format '{}'", self.logging.format));
        }
        if self.policy.force_geofence {
            tracing::warn!("force_geofence is enabled; geofence checks are bypassed");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.policy.force_geofence);
        assert_eq!(config.trigger.cooldown_ms(), 3_000);
        assert_eq!(config.token.lifetime_secs(), 60);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = AppConfig::default();
        config.token.lifetime = Duration::from_secs(3_600);
        config.logging.format = "xml".to_string();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"trigger":{"cooldown":"5s"},"policy":{"force_geofence":true}}"#).unwrap();
        assert_eq!(config.trigger.cooldown, Duration::from_secs(5));
        assert_eq!(config.trigger.beacon_timeout_ms(), 15_000);
        assert!(config.policy.force_geofence);
        assert!(config.verifier.require_target_beacon);
    }
}
