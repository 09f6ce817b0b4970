//! Token configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default token lifetime
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60);

/// Upper bound on token lifetime
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Token type carried by account-payment tokens
pub const ACCOUNT_TOKEN_TYPE: &str = "account";

/// Issuance settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Validity window after issuance
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,
    /// Value of the `type` field
    pub token_type: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_TOKEN_LIFETIME,
            token_type: ACCOUNT_TOKEN_TYPE.to_string(),
        }
    }
}

impl TokenConfig {
    pub fn lifetime_secs(&self) -> i64 {
        i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.lifetime < Duration::from_secs(1) {
            errors.push("Token lifetime must be at least 1 second".to_string());
        }
        if self.lifetime > MAX_TOKEN_LIFETIME {
            errors.push(format!(
                "Token lifetime must not exceed {} seconds",
                MAX_TOKEN_LIFETIME.as_secs()
            ));
        }
        if self.token_type.is_empty() {
            errors.push("Token type must be set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Verification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Deny when the captured context has no target beacon
    pub require_target_beacon: bool,
    /// Treat an empty nonce on either side as a mismatch
    pub require_nonce: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            require_target_beacon: true,
            require_nonce: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TokenConfig::default();
        assert_eq!(config.lifetime_secs(), 60);
        assert_eq!(config.token_type, "account");
        assert!(config.validate().is_ok());

        let verifier = VerifierConfig::default();
        assert!(verifier.require_target_beacon);
        assert!(!verifier.require_nonce);
    }

    #[test]
    fn test_lifetime_is_capped() {
        let config = TokenConfig {
            lifetime: Duration::from_secs(10 * 60),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("300"));
    }

    #[test]
    fn test_humantime_lifetime() {
        let config: TokenConfig = serde_json::from_str(r#"{"lifetime":"90s"}"#).unwrap();
        assert_eq!(config.lifetime, Duration::from_secs(90));
        assert_eq!(config.token_type, "account");
    }
}
