//! Whitelist file format
//!
//! ```json
//! {
//!   "beacons": [
//!     { "uuid": "…", "major": 1, "minor": 1, "name": "Cafe", "location_id": "store-1", "merchant_id": "m-1" }
//!   ],
//!   "merchants": [
//!     { "merchant_id": "m-1", "public_key": "<64 hex chars>" }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use contextpay_crypto::PublicKey;
use contextpay_types::{BeaconIdentity, MerchantEntry};
use serde::{Deserialize, Serialize};

use crate::{InMemoryMerchantRegistry, RegistryError, RegistryResult};

/// One whitelisted beacon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconRecord {
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
    #[serde(default)]
    pub name: Option<String>,
    pub location_id: String,
    pub merchant_id: String,
}

/// One merchant verification key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantKeyRecord {
    pub merchant_id: String,
    /// Hex-encoded Ed25519 public key
    pub public_key: String,
}

/// Serialized whitelist
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Whitelist {
    #[serde(default)]
    pub beacons: Vec<BeaconRecord>,
    #[serde(default)]
    pub merchants: Vec<MerchantKeyRecord>,
}

impl InMemoryMerchantRegistry {
    /// Build a registry from whitelist JSON
    ///
    /// Fails on malformed JSON, an unparseable key, or the same beacon listed
    /// twice.
    pub fn from_json(json: &str) -> RegistryResult<Self> {
        let whitelist: Whitelist =
            serde_json::from_str(json).map_err(|e| RegistryError::InvalidJson(e.to_string()))?;
        Self::from_whitelist(whitelist)
    }

    /// Build a registry from a whitelist file
    pub fn from_file(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    pub fn from_whitelist(whitelist: Whitelist) -> RegistryResult<Self> {
        let registry = Self::new();
        let mut seen = HashSet::new();

        for record in whitelist.beacons {
            let identity = BeaconIdentity::new(record.uuid.to_lowercase(), record.major, record.minor);
            if !seen.insert(identity.clone()) {
                return Err(RegistryError::DuplicateBeacon(identity.composite_key()));
            }
            registry.register_beacon(
                identity,
                MerchantEntry {
                    name: record.name,
                    location_id: record.location_id,
                    merchant_id: record.merchant_id,
                },
            );
        }

        for record in whitelist.merchants {
            let key = PublicKey::from_hex(&record.public_key).map_err(|e| {
                RegistryError::InvalidPublicKey {
                    merchant_id: record.merchant_id.clone(),
                    message: e.to_string(),
                }
            })?;
            registry.register_merchant_key(record.merchant_id, key);
        }

        tracing::info!(
            beacons = registry.beacon_count(),
            merchants = registry.merchant_count(),
            "Whitelist loaded"
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MerchantRegistry;
    use contextpay_crypto::KeyPair;

    fn whitelist_json(public_key: &str) -> String {
        format!(
            r#"{{
                "beacons": [
                    {{ "uuid": "UUID-A", "major": 1, "minor": 1, "name": "Cafe A", "location_id": "store-a", "merchant_id": "m-a" }},
                    {{ "uuid": "uuid-b", "major": 2, "minor": 7, "location_id": "store-b", "merchant_id": "m-b" }}
                ],
                "merchants": [
                    {{ "merchant_id": "m-a", "public_key": "{}" }}
                ]
            }}"#,
            public_key
        )
    }

    #[test]
    fn test_load_whitelist() {
        let keypair = KeyPair::generate();
        let registry = InMemoryMerchantRegistry::from_json(&whitelist_json(&keypair.public_key_hex())).unwrap();

        assert_eq!(registry.beacon_count(), 2);
        let a = registry.find_beacon(&BeaconIdentity::new("uuid-a", 1, 1)).unwrap();
        assert_eq!(a.name.as_deref(), Some("Cafe A"));
        let b = registry.find_beacon(&BeaconIdentity::new("uuid-b", 2, 7)).unwrap();
        assert!(b.name.is_none());

        assert_eq!(
            registry.merchant_public_key("m-a"),
            Some(PublicKey::from_keypair(&keypair))
        );
    }

    #[test]
    fn test_bad_public_key_rejected() {
        let result = InMemoryMerchantRegistry::from_json(&whitelist_json("zz"));
        assert!(matches!(result, Err(RegistryError::InvalidPublicKey { .. })));
    }

    #[test]
    fn test_duplicate_beacon_rejected() {
        let json = r#"{
            "beacons": [
                { "uuid": "u", "major": 1, "minor": 1, "location_id": "s", "merchant_id": "m" },
                { "uuid": "U", "major": 1, "minor": 1, "location_id": "s2", "merchant_id": "m2" }
            ]
        }"#;
        let result = InMemoryMerchantRegistry::from_json(json);
        assert!(matches!(result, Err(RegistryError::DuplicateBeacon(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            InMemoryMerchantRegistry::from_json("{ not json"),
            Err(RegistryError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_empty_whitelist() {
        let registry = InMemoryMerchantRegistry::from_json("{}").unwrap();
        assert_eq!(registry.beacon_count(), 0);
    }
}
