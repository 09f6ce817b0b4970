//! Identity types for ContextPay
//!
//! A beacon is identified by the iBeacon-style tuple `(uuid, major, minor)`.
//! The composite key string `uuid|major|minor` is what crosses the UI
//! boundary when the user picks between several merchants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ContextPayError, Result};

/// Separator used by the composite beacon key
pub const KEY_SEPARATOR: char = '|';

/// Identity of a proximity beacon
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeaconIdentity {
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
}

impl BeaconIdentity {
    /// Create a new identity
    pub fn new(uuid: impl Into<String>, major: u16, minor: u16) -> Self {
        Self {
            uuid: uuid.into(),
            major,
            minor,
        }
    }

    /// Canonical form: beacon UUIDs compare case-insensitively
    pub fn normalized(&self) -> Self {
        Self::new(self.uuid.to_lowercase(), self.major, self.minor)
    }

    /// Stable composite key (`uuid|major|minor`)
    pub fn composite_key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.uuid,
            self.major,
            self.minor,
            sep = KEY_SEPARATOR
        )
    }

    /// Parse a composite key back into an identity
    ///
    /// The key must split into exactly three parts and major/minor must be
    /// numeric.
    pub fn parse_composite_key(key: &str) -> Result<Self> {
        let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(ContextPayError::InvalidBeaconKey {
                key: key.to_string(),
                reason: format!("expected 3 parts, got {}", parts.len()),
            });
        }
        if parts[0].is_empty() {
            return Err(ContextPayError::InvalidBeaconKey {
                key: key.to_string(),
                reason: "empty uuid".to_string(),
            });
        }

        let major = parts[1].parse::<u16>().map_err(|e| ContextPayError::InvalidBeaconKey {
            key: key.to_string(),
            reason: format!("major: {}", e),
        })?;
        let minor = parts[2].parse::<u16>().map_err(|e| ContextPayError::InvalidBeaconKey {
            key: key.to_string(),
            reason: format!("minor: {}", e),
        })?;

        Ok(Self::new(parts[0], major, minor))
    }
}

impl fmt::Display for BeaconIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.composite_key())
    }
}

impl FromStr for BeaconIdentity {
    type Err = ContextPayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_composite_key(s)
    }
}
