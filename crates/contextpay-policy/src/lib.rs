//! ContextPay Policy - Presence evaluation and prompt admission
//!
//! Pure functions over a [`SignalSnapshot`]:
//! - [`PolicyEvaluator::evaluate`] decides whether current presence signals
//!   justify a payment prompt, and which signal justifies it
//! - [`PolicyEvaluator::admit`] applies the admission rule a prompt surface
//!   checks when it opens
//!
//! Geofence alone never allows a prompt. Beacons are the strong signal,
//! trusted Wi-Fi is accepted, and geofence only corroborates.

use contextpay_types::{BeaconSighting, SignalSnapshot, TriggerReason, UNKNOWN_FENCE};
use serde::{Deserialize, Serialize};

/// Policy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Demo override: treat the geofence as satisfied regardless of GPS, and
    /// align the fence location with the detected beacon
    pub force_geofence: bool,
}

impl PolicyConfig {
    /// Whether the geofence condition holds
    pub fn geofence_satisfied(&self, in_zone: bool) -> bool {
        self.force_geofence || in_zone
    }
}

/// Which signal justifies a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Justification {
    Beacon,
    Wifi,
    Geofence,
}

/// Derived admit/deny decision, never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allow: bool,
    pub candidates: Vec<BeaconSighting>,
    /// `None` when no signal is present at all
    pub justification: Option<Justification>,
}

/// Log-oriented summary of the current policy state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDescription {
    pub allow: bool,
    /// Lowercased location of the first candidate beacon
    pub beacon_location: Option<String>,
    /// Effective fence location (the beacon location under `force_geofence`)
    pub fence_location: Option<String>,
    pub location_match: bool,
    pub geofence_ok: bool,
}

/// Facts a prompt surface checks when it opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionFacts<'a> {
    pub trigger: TriggerReason,
    pub geo_flag: bool,
    pub wifi_flag: bool,
    /// Location of the target beacon, when the prompt carries one
    pub beacon_location: Option<&'a str>,
    pub has_beacon: bool,
    /// Fence id, `"unknown"` when none was reported
    pub fence_id: &'a str,
}

/// Result of the admission rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionVerdict {
    Admitted,
    NotAdmitted,
    /// Geofence and beacon both present but naming different locations
    LocationConflict { beacon_location: String, fence_id: String },
}

/// Evaluates presence policy
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator {
    config: PolicyConfig,
}

impl PolicyEvaluator {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Decide whether the snapshot justifies a prompt
    pub fn evaluate(&self, snapshot: &SignalSnapshot) -> PolicyDecision {
        let allow = snapshot.has_beacons() || snapshot.wifi.trusted;

        let justification = if snapshot.has_beacons() {
            Some(Justification::Beacon)
        } else if snapshot.wifi.trusted {
            Some(Justification::Wifi)
        } else if self.config.geofence_satisfied(snapshot.fence.in_zone) {
            Some(Justification::Geofence)
        } else {
            None
        };

        PolicyDecision {
            allow,
            candidates: snapshot.beacons.clone(),
            justification,
        }
    }

    /// Summarize the snapshot for the QR path and diagnostics
    pub fn describe(&self, snapshot: &SignalSnapshot) -> PolicyDescription {
        let beacon_location = snapshot
            .beacons
            .first()
            .map(|b| b.location_id.to_lowercase());
        let raw_fence = snapshot.fence.fence_id.clone();

        let fence_location = if self.config.force_geofence {
            beacon_location.clone().or(raw_fence)
        } else {
            raw_fence
        };

        let location_match = matches!(
            (&beacon_location, &fence_location),
            (Some(b), Some(f)) if b == f
        );

        PolicyDescription {
            allow: snapshot.has_beacons() || snapshot.wifi.trusted,
            beacon_location,
            fence_location,
            location_match,
            geofence_ok: self.config.geofence_satisfied(snapshot.fence.in_zone),
        }
    }

    /// Admission rule for an opening prompt
    ///
    /// Admitted when geofence and beacon agree, when on trusted Wi-Fi, or when
    /// the user opened the prompt directly or picked a merchant.
    pub fn admit(&self, facts: &AdmissionFacts<'_>) -> AdmissionVerdict {
        let user_driven = matches!(
            facts.trigger,
            TriggerReason::User | TriggerReason::BeaconSelected
        );
        let allow = (facts.geo_flag && facts.has_beacon) || facts.wifi_flag || user_driven;

        if !allow {
            tracing::debug!(
                trigger = %facts.trigger,
                geo = facts.geo_flag,
                beacon = facts.has_beacon,
                wifi = facts.wifi_flag,
                "Prompt blocked: need geofence and beacon, trusted Wi-Fi, or a user action"
            );
            return AdmissionVerdict::NotAdmitted;
        }

        if facts.geo_flag && facts.has_beacon {
            if let Some(location) = facts.beacon_location {
                if facts.fence_id != UNKNOWN_FENCE && !location.eq_ignore_ascii_case(facts.fence_id) {
                    tracing::warn!(
                        beacon_location = %location,
                        fence_id = %facts.fence_id,
                        "Geofence and beacon disagree on location"
                    );
                    return AdmissionVerdict::LocationConflict {
                        beacon_location: location.to_string(),
                        fence_id: facts.fence_id.to_string(),
                    };
                }
            }
        }

        AdmissionVerdict::Admitted
    }
}
