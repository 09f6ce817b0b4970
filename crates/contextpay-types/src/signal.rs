//! Presence signal types
//!
//! Raw state for the three independent presence sources plus the inbound
//! events that mutate it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::BeaconIdentity;
use crate::merchant::MerchantEntry;

/// A registered beacon currently visible to the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconSighting {
    pub identity: BeaconIdentity,
    /// Merchant display name
    pub name: Option<String>,
    pub location_id: String,
    pub merchant_id: String,
    /// Nonce advertised by the beacon, if any
    pub nonce: Option<String>,
    pub rssi: i32,
    /// Last time this beacon was seen (unix millis)
    pub last_seen: i64,
}

impl BeaconSighting {
    /// Build a sighting from a registry entry
    pub fn from_entry(
        identity: BeaconIdentity,
        entry: &MerchantEntry,
        nonce: Option<String>,
        rssi: i32,
        seen_at: i64,
    ) -> Self {
        Self {
            identity,
            name: entry.name.clone(),
            location_id: entry.location_id.clone(),
            merchant_id: entry.merchant_id.clone(),
            nonce,
            rssi,
            last_seen: seen_at,
        }
    }

    /// Whether the sighting is older than `timeout_ms` at `now`
    pub fn is_expired(&self, now: i64, timeout_ms: i64) -> bool {
        now - self.last_seen > timeout_ms
    }

    /// Name shown to the user, falling back to the composite key
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.identity.composite_key())
    }
}

/// Geofence membership
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FenceState {
    pub in_zone: bool,
    /// Lowercased fence identifier
    pub fence_id: Option<String>,
}

impl FenceState {
    /// Create a fence state, normalizing the fence id to lowercase
    pub fn new(in_zone: bool, fence_id: Option<&str>) -> Self {
        Self {
            in_zone,
            fence_id: fence_id.map(|f| f.to_lowercase()),
        }
    }
}

/// Trusted network association
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiState {
    pub trusted: bool,
}

/// Immutable, internally consistent copy of all signal state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub beacons: Vec<BeaconSighting>,
    pub fence: FenceState,
    pub wifi: WifiState,
    /// When the snapshot was taken (unix millis)
    pub taken_at: i64,
}

impl SignalSnapshot {
    pub fn has_beacons(&self) -> bool {
        !self.beacons.is_empty()
    }
}

/// What caused an arbitration pass or a prompt to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerReason {
    Geofence,
    Beacon,
    Wifi,
    /// User picked a merchant from the selection list
    BeaconSelected,
    /// User opened the prompt manually
    User,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::Geofence => "GEOFENCE",
            TriggerReason::Beacon => "BEACON",
            TriggerReason::Wifi => "WIFI",
            TriggerReason::BeaconSelected => "BEACON_SELECTED",
            TriggerReason::User => "USER",
        }
    }
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geofence transition event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofenceEvent {
    pub in_zone: bool,
    #[serde(default)]
    pub fence_id: Option<String>,
}

/// Beacon sighting event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconEvent {
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
    #[serde(default)]
    pub nonce: Option<String>,
    pub rssi: i32,
}

impl BeaconEvent {
    pub fn identity(&self) -> BeaconIdentity {
        BeaconIdentity::new(self.uuid.clone(), self.major, self.minor)
    }
}

/// Trusted Wi-Fi event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiEvent {
    pub trusted: bool,
}

/// Any inbound presence signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalEvent {
    Geofence(GeofenceEvent),
    Beacon(BeaconEvent),
    Wifi(WifiEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_id_is_lowercased() {
        let fence = FenceState::new(true, Some("Store-GANGNAM"));
        assert_eq!(fence.fence_id.as_deref(), Some("store-gangnam"));
    }

    #[test]
    fn test_sighting_expiry_boundary() {
        let entry = MerchantEntry::new("Cafe", "loc-1", "m-1");
        let sighting =
            BeaconSighting::from_entry(BeaconIdentity::new("u", 1, 1), &entry, None, -60, 1_000);

        assert!(!sighting.is_expired(16_000, 15_000));
        assert!(sighting.is_expired(16_001, 15_000));
    }

    #[test]
    fn test_signal_event_json() {
        let json = r#"{"type":"beacon","uuid":"uuid-A","major":1,"minor":1,"rssi":-55}"#;
        let event: SignalEvent = serde_json::from_str(json).unwrap();
        match event {
            SignalEvent::Beacon(b) => {
                assert_eq!(b.identity(), BeaconIdentity::new("uuid-A", 1, 1));
                assert!(b.nonce.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_trigger_reason_tags() {
        assert_eq!(TriggerReason::BeaconSelected.to_string(), "BEACON_SELECTED");
        let json = serde_json::to_string(&TriggerReason::Geofence).unwrap();
        assert_eq!(json, "\"GEOFENCE\"");
    }
}
