//! Outbound prompt requests

use contextpay_registry::MerchantRegistry;
use contextpay_types::{BeaconIdentity, BeaconSighting, TriggerReason, UNKNOWN_FENCE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TITLE: &str = "Payment available";
pub const VERIFIED_MERCHANT_MESSAGE: &str = "Verified merchant detected.";
pub const ENTERED_AREA_MESSAGE: &str = "Entered store area.";
pub const SELECTED_MERCHANT_MESSAGE: &str = "Store detected.";
pub const SELECTION_TITLE: &str = "Multiple stores detected";
pub const SELECTION_MESSAGE: &str = "Tap to choose the store to pay at.";

/// Merchant and beacon bound into a single-target prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconTarget {
    pub merchant_id: String,
    pub location_id: String,
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
    pub nonce: Option<String>,
    pub name: Option<String>,
}

impl BeaconTarget {
    pub fn identity(&self) -> BeaconIdentity {
        BeaconIdentity::new(self.uuid.clone(), self.major, self.minor)
    }
}

impl From<&BeaconSighting> for BeaconTarget {
    fn from(sighting: &BeaconSighting) -> Self {
        Self {
            merchant_id: sighting.merchant_id.clone(),
            location_id: sighting.location_id.clone(),
            uuid: sighting.identity.uuid.clone(),
            major: sighting.identity.major,
            minor: sighting.identity.minor,
            nonce: sighting.nonce.clone(),
            name: sighting.name.clone(),
        }
    }
}

/// Request to present a payment prompt for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentSingleRequest {
    pub title: String,
    pub message: String,
    pub trigger_reason: TriggerReason,
    /// Resolved beacon, absent for Wi-Fi and geofence prompts
    pub beacon: Option<BeaconTarget>,
    /// Lowercased fence id, `"unknown"` when none was reported
    pub fence_id: String,
    pub geo_flag: bool,
    pub wifi_flag: bool,
}

impl PresentSingleRequest {
    /// Prompt with no beacon bound
    pub fn unbound(message: &str, trigger_reason: TriggerReason) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            message: message.to_string(),
            trigger_reason,
            beacon: None,
            fence_id: UNKNOWN_FENCE.to_string(),
            geo_flag: false,
            wifi_flag: false,
        }
    }

    /// Prompt opened directly by the user
    pub fn user_initiated() -> Self {
        Self::unbound(VERIFIED_MERCHANT_MESSAGE, TriggerReason::User)
    }

    pub fn with_fence(mut self, fence_id: Option<&str>) -> Self {
        self.fence_id = fence_id
            .map(|f| f.to_lowercase())
            .unwrap_or_else(|| UNKNOWN_FENCE.to_string());
        self
    }

    pub fn with_flags(mut self, geo_flag: bool, wifi_flag: bool) -> Self {
        self.geo_flag = geo_flag;
        self.wifi_flag = wifi_flag;
        self
    }
}

/// Selection request failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Malformed selection payload: {names} names, {keys} keys")]
    Malformed { names: usize, keys: usize },

    #[error("Key not offered in this selection: {0}")]
    UnknownKey(String),

    #[error("Malformed beacon key: {0}")]
    MalformedKey(String),

    #[error("Beacon no longer registered: {0}")]
    UnknownBeacon(String),
}

/// Request to let the user pick one of several detected merchants
///
/// `names` and `keys` are parallel arrays; `keys[i]` is the `uuid|major|minor`
/// composite key of the merchant shown as `names[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentSelectionRequest {
    pub title: String,
    pub message: String,
    pub names: Vec<String>,
    pub keys: Vec<String>,
}

impl PresentSelectionRequest {
    /// Build from the candidate sightings
    pub fn from_sightings(sightings: &[BeaconSighting]) -> Self {
        Self {
            title: SELECTION_TITLE.to_string(),
            message: SELECTION_MESSAGE.to_string(),
            names: sightings.iter().map(BeaconSighting::display_name).collect(),
            keys: sightings.iter().map(|s| s.identity.composite_key()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolve the user's pick into a single-target request
    ///
    /// The merchant is looked up again in the registry rather than trusted
    /// from the payload. Nothing changes on failure.
    pub fn resolve(
        &self,
        key: &str,
        registry: &dyn MerchantRegistry,
    ) -> Result<PresentSingleRequest, SelectionError> {
        if self.names.is_empty() || self.keys.is_empty() || self.names.len() != self.keys.len() {
            return Err(SelectionError::Malformed {
                names: self.names.len(),
                keys: self.keys.len(),
            });
        }

        if !self.keys.iter().any(|k| k == key) {
            return Err(SelectionError::UnknownKey(key.to_string()));
        }

        let identity = BeaconIdentity::parse_composite_key(key)
            .map_err(|e| SelectionError::MalformedKey(e.to_string()))?;

        let entry = registry
            .find_beacon(&identity)
            .ok_or_else(|| SelectionError::UnknownBeacon(key.to_string()))?;

        let target = BeaconTarget {
            merchant_id: entry.merchant_id,
            location_id: entry.location_id,
            uuid: identity.uuid,
            major: identity.major,
            minor: identity.minor,
            nonce: None,
            name: entry.name,
        };

        Ok(PresentSingleRequest {
            title: target.name.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            message: SELECTED_MERCHANT_MESSAGE.to_string(),
            trigger_reason: TriggerReason::BeaconSelected,
            beacon: Some(target),
            fence_id: UNKNOWN_FENCE.to_string(),
            geo_flag: false,
            wifi_flag: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextpay_registry::InMemoryMerchantRegistry;
    use contextpay_types::MerchantEntry;

    fn sighting(uuid: &str, major: u16, minor: u16, name: Option<&str>) -> BeaconSighting {
        BeaconSighting {
            identity: BeaconIdentity::new(uuid, major, minor),
            name: name.map(str::to_string),
            location_id: format!("loc-{}", uuid),
            merchant_id: format!("m-{}", uuid),
            nonce: None,
            rssi: -60,
            last_seen: 0,
        }
    }

    fn registry() -> InMemoryMerchantRegistry {
        let registry = InMemoryMerchantRegistry::new();
        registry.register_beacon(
            BeaconIdentity::new("uuid-a", 1, 1),
            MerchantEntry::new("Cafe A", "store-a", "m-a"),
        );
        registry
    }

    #[test]
    fn test_selection_arrays_stay_parallel() {
        let request = PresentSelectionRequest::from_sightings(&[
            sighting("uuid-a", 1, 1, Some("Cafe A")),
            sighting("uuid-b", 2, 2, None),
        ]);

        assert_eq!(request.names.len(), request.keys.len());
        assert_eq!(request.names[0], "Cafe A");
        assert_eq!(request.names[1], "uuid-b|2|2");
        for key in &request.keys {
            assert_eq!(key.split('|').count(), 3);
        }
    }

    #[test]
    fn test_resolve_rebinds_from_registry() {
        let request = PresentSelectionRequest::from_sightings(&[
            sighting("uuid-a", 1, 1, Some("stale name")),
            sighting("uuid-b", 2, 2, None),
        ]);

        let single = request.resolve("uuid-a|1|1", &registry()).unwrap();
        assert_eq!(single.trigger_reason, TriggerReason::BeaconSelected);
        assert_eq!(single.title, "Cafe A");
        assert_eq!(single.message, SELECTED_MERCHANT_MESSAGE);
        let target = single.beacon.unwrap();
        assert_eq!(target.location_id, "store-a");
        assert_eq!(target.merchant_id, "m-a");
        assert_eq!(target.identity(), BeaconIdentity::new("uuid-a", 1, 1));
    }

    #[test]
    fn test_resolve_failures() {
        let registry = registry();

        let mismatched = PresentSelectionRequest {
            title: SELECTION_TITLE.into(),
            message: SELECTION_MESSAGE.into(),
            names: vec!["only one".into()],
            keys: vec!["uuid-a|1|1".into(), "uuid-b|2|2".into()],
        };
        assert!(matches!(
            mismatched.resolve("uuid-a|1|1", &registry),
            Err(SelectionError::Malformed { names: 1, keys: 2 })
        ));

        let bad_keys = PresentSelectionRequest {
            title: SELECTION_TITLE.into(),
            message: SELECTION_MESSAGE.into(),
            names: vec!["A".into(), "B".into(), "C".into()],
            keys: vec!["uuid-a|1|1".into(), "uuid-a|x|1".into(), "uuid-b|2|2".into()],
        };
        assert!(matches!(
            bad_keys.resolve("uuid-z|9|9", &registry),
            Err(SelectionError::UnknownKey(_))
        ));
        assert!(matches!(
            bad_keys.resolve("uuid-a|x|1", &registry),
            Err(SelectionError::MalformedKey(_))
        ));
        assert!(matches!(
            bad_keys.resolve("uuid-b|2|2", &registry),
            Err(SelectionError::UnknownBeacon(_))
        ));
    }

    #[test]
    fn test_user_initiated_defaults() {
        let request = PresentSingleRequest::user_initiated().with_fence(Some("Store-A"));
        assert_eq!(request.trigger_reason, TriggerReason::User);
        assert_eq!(request.fence_id, "store-a");
        assert!(request.beacon.is_none());
    }
}
