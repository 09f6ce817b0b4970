//! Thread-safe holder of raw presence signals
//!
//! The store never takes the arbitration lock. Each observe operation returns
//! a [`SignalEffect`] telling the arbiter what to do next.

use std::collections::BTreeMap;
use std::time::Duration;

use contextpay_types::{
    BeaconIdentity, BeaconSighting, FenceState, MerchantEntry, SignalSnapshot, TriggerReason,
    WifiState,
};
use parking_lot::RwLock;

use crate::config::{TriggerConfig, BEACON_TIMEOUT_MS};

/// Follow-up requested by a signal mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalEffect {
    /// Run an arbitration pass tagged with this reason
    pub arbitrate: Option<TriggerReason>,
    /// Cancel any outstanding notification
    pub cancel: bool,
}

impl SignalEffect {
    pub fn none() -> Self {
        Self::default()
    }

    fn arbitrate(reason: TriggerReason) -> Self {
        Self {
            arbitrate: Some(reason),
            cancel: false,
        }
    }
}

#[derive(Debug, Default)]
struct Signals {
    beacons: BTreeMap<BeaconIdentity, BeaconSighting>,
    fence: FenceState,
    wifi: WifiState,
}

/// Current geofence, beacon, and Wi-Fi state
#[derive(Debug)]
pub struct SignalStore {
    signals: RwLock<Signals>,
    beacon_timeout_ms: i64,
}

impl SignalStore {
    pub fn new() -> Self {
        Self {
            signals: RwLock::new(Signals::default()),
            beacon_timeout_ms: BEACON_TIMEOUT_MS as i64,
        }
    }

    pub fn with_beacon_timeout(timeout: Duration) -> Self {
        Self {
            signals: RwLock::new(Signals::default()),
            beacon_timeout_ms: i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Store honoring the sighting lifetime from a [`TriggerConfig`]
    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::with_beacon_timeout(config.beacon_timeout)
    }

    pub fn beacon_timeout_ms(&self) -> i64 {
        self.beacon_timeout_ms
    }

    /// Replace the fence state
    pub fn observe_geofence(&self, in_zone: bool, fence_id: Option<&str>) -> SignalEffect {
        let fence = FenceState::new(in_zone, fence_id);
        tracing::debug!(in_zone, fence_id = ?fence.fence_id, "Geofence observed");
        self.signals.write().fence = fence;

        SignalEffect {
            arbitrate: Some(TriggerReason::Geofence),
            cancel: !in_zone,
        }
    }

    /// Record a beacon sighting
    ///
    /// `lookup` is the registry result for the beacon. A beacon the registry
    /// does not know is dropped without touching state. Sightings are keyed by
    /// the normalized identity, so a UUID reported in a different case
    /// refreshes the existing entry.
    pub fn observe_beacon(
        &self,
        identity: BeaconIdentity,
        lookup: Option<&MerchantEntry>,
        nonce: Option<String>,
        rssi: i32,
        now: i64,
    ) -> SignalEffect {
        let Some(entry) = lookup else {
            tracing::debug!(beacon = %identity, rssi, "Ignoring beacon not in registry");
            return SignalEffect::none();
        };

        let identity = identity.normalized();
        tracing::debug!(
            beacon = %identity,
            location_id = %entry.location_id,
            rssi,
            "Beacon observed"
        );
        let sighting = BeaconSighting::from_entry(identity.clone(), entry, nonce, rssi, now);
        self.signals.write().beacons.insert(identity, sighting);

        SignalEffect::arbitrate(TriggerReason::Beacon)
    }

    /// Replace the Wi-Fi state
    pub fn observe_wifi(&self, trusted: bool) -> SignalEffect {
        tracing::debug!(trusted, "Trusted Wi-Fi observed");
        self.signals.write().wifi = WifiState { trusted };

        if trusted {
            SignalEffect::arbitrate(TriggerReason::Wifi)
        } else {
            SignalEffect {
                arbitrate: None,
                cancel: true,
            }
        }
    }

    /// Drop sightings older than the beacon timeout; returns the removed identities
    pub fn sweep_expired(&self, now: i64) -> Vec<BeaconIdentity> {
        let mut signals = self.signals.write();
        let expired: Vec<BeaconIdentity> = signals
            .beacons
            .values()
            .filter(|s| s.is_expired(now, self.beacon_timeout_ms))
            .map(|s| s.identity.clone())
            .collect();

        for identity in &expired {
            signals.beacons.remove(identity);
            tracing::debug!(beacon = %identity, "Beacon timed out");
        }
        expired
    }

    /// Consistent copy of all signal state
    pub fn snapshot(&self, now: i64) -> SignalSnapshot {
        let signals = self.signals.read();
        SignalSnapshot {
            beacons: signals.beacons.values().cloned().collect(),
            fence: signals.fence.clone(),
            wifi: signals.wifi,
            taken_at: now,
        }
    }

    /// Live sighting for one beacon
    pub fn sighting(&self, identity: &BeaconIdentity) -> Option<BeaconSighting> {
        self.signals.read().beacons.get(&identity.normalized()).cloned()
    }

    pub fn beacon_count(&self) -> usize {
        self.signals.read().beacons.len()
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new()
    }
}
