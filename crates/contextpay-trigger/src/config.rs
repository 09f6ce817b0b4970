//! Trigger configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum spacing between two prompts
pub const COOLDOWN_MS: u64 = 3_000;

/// A beacon not seen for this long is dropped
pub const BEACON_TIMEOUT_MS: u64 = 15_000;

/// Arbitration timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// No two prompts are posted closer together than this
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    /// Sighting lifetime without a refresh
    #[serde(with = "humantime_serde")]
    pub beacon_timeout: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(COOLDOWN_MS),
            beacon_timeout: Duration::from_millis(BEACON_TIMEOUT_MS),
        }
    }
}

impl TriggerConfig {
    pub fn cooldown_ms(&self) -> i64 {
        duration_ms(self.cooldown)
    }

    pub fn beacon_timeout_ms(&self) -> i64 {
        duration_ms(self.beacon_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.cooldown.is_zero() {
            errors.push("Trigger cooldown must be greater than zero".to_string());
        }
        if self.beacon_timeout.is_zero() {
            errors.push("Beacon timeout must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
