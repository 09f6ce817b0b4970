//! Trigger arbitration
//!
//! Every signal event runs one arbitration pass:
//!
//! 1. sweep expired beacons
//! 2. classify the snapshot as beacons, Wi-Fi only, or geofence only
//! 3. nothing qualifies: cancel and go idle
//! 4. inside the cooldown window: suppress
//! 5. pick selection, single beacon, Wi-Fi, or geofence prompt
//! 6. stamp `last_shown_at` and emit exactly one request
//!
//! Steps 2 through 6 run under one mutex, so two concurrent passes can never
//! both clear the cooldown check.

use std::sync::Arc;

use contextpay_policy::{PolicyConfig, PolicyDescription, PolicyEvaluator};
use contextpay_registry::MerchantRegistry;
use contextpay_types::{
    BeaconEvent, BeaconIdentity, Clock, GeofenceEvent, SignalEvent, SignalSnapshot, TriggerReason,
    WifiEvent,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::TriggerConfig;
use crate::request::{
    BeaconTarget, PresentSelectionRequest, PresentSingleRequest, SelectionError, DEFAULT_TITLE,
    ENTERED_AREA_MESSAGE, VERIFIED_MERCHANT_MESSAGE,
};
use crate::sink::PromptSink;
use crate::store::{SignalEffect, SignalStore};

/// What is currently being presented
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentTarget {
    SingleBeacon(BeaconIdentity),
    MultiBeaconSelection { candidates: usize },
    WifiOnly,
    GeofenceOnly,
}

/// Arbiter state as seen from outside
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbiterPhase {
    Idle,
    CooldownActive,
    Presenting(PresentTarget),
}

/// Result of handling one signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbitrationOutcome {
    Presented(PresentTarget),
    /// A prompt would qualify but the cooldown window is still open
    Suppressed,
    /// No presence class holds; outstanding prompts were cancelled
    Denied,
    /// Signal changed no state worth arbitrating
    Ignored,
    /// Signal loss withdrew the prompt; nothing was presented
    Cancelled,
}

#[derive(Debug, Default)]
struct ArbiterState {
    last_shown_at: Option<i64>,
    presenting: Option<PresentTarget>,
}

/// Owns cooldown bookkeeping and routes prompts to a [`PromptSink`]
pub struct TriggerArbiter {
    store: Arc<SignalStore>,
    registry: Arc<dyn MerchantRegistry>,
    sink: Arc<dyn PromptSink>,
    clock: Arc<dyn Clock>,
    policy: PolicyEvaluator,
    config: TriggerConfig,
    state: Mutex<ArbiterState>,
}

impl TriggerArbiter {
    pub fn new(
        store: Arc<SignalStore>,
        registry: Arc<dyn MerchantRegistry>,
        sink: Arc<dyn PromptSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            sink,
            clock,
            policy: PolicyEvaluator::default(),
            config: TriggerConfig::default(),
            state: Mutex::new(ArbiterState::default()),
        }
    }

    /// Replace the timing config
    ///
    /// The store keeps its own sighting lifetime. Build it with
    /// [`SignalStore::from_config`] to share one config, or use
    /// [`TriggerArbiter::from_config`].
    pub fn with_config(mut self, config: TriggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Arbiter over a fresh store that honors `config.beacon_timeout`
    pub fn from_config(
        config: TriggerConfig,
        registry: Arc<dyn MerchantRegistry>,
        sink: Arc<dyn PromptSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(SignalStore::from_config(&config));
        Self::new(store, registry, sink, clock).with_config(config)
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = PolicyEvaluator::new(policy);
        self
    }

    pub fn store(&self) -> &Arc<SignalStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<dyn MerchantRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &PolicyEvaluator {
        &self.policy
    }

    /// Geofence transition
    ///
    /// An exit withdraws whatever is showing and presents nothing in the same
    /// step.
    pub fn on_geofence(&self, event: &GeofenceEvent) -> ArbitrationOutcome {
        let effect = self
            .store
            .observe_geofence(event.in_zone, event.fence_id.as_deref());
        self.apply(effect)
    }

    /// Beacon sighting, resolved against the registry
    pub fn on_beacon(&self, event: &BeaconEvent) -> ArbitrationOutcome {
        let identity = event.identity();
        let lookup = self.registry.find_beacon(&identity);
        let effect = self.store.observe_beacon(
            identity,
            lookup.as_ref(),
            event.nonce.clone(),
            event.rssi,
            self.clock.now_millis(),
        );
        self.apply(effect)
    }

    /// One scan batch of beacon sightings, arbitrated in a single pass
    ///
    /// Beacons reported together are treated as seen at the same moment, so
    /// several merchants in one batch yield a selection rather than a run of
    /// single prompts.
    pub fn on_beacon_batch(&self, events: &[BeaconEvent]) -> ArbitrationOutcome {
        let now = self.clock.now_millis();
        let mut arbitrate = false;

        for event in events {
            let identity = event.identity();
            let lookup = self.registry.find_beacon(&identity);
            let effect = self
                .store
                .observe_beacon(identity, lookup.as_ref(), event.nonce.clone(), event.rssi, now);
            arbitrate |= effect.arbitrate.is_some();
        }

        if arbitrate {
            self.evaluate(TriggerReason::Beacon)
        } else {
            ArbitrationOutcome::Ignored
        }
    }

    /// Trusted Wi-Fi change
    pub fn on_wifi(&self, event: &WifiEvent) -> ArbitrationOutcome {
        let effect = self.store.observe_wifi(event.trusted);
        self.apply(effect)
    }

    /// Dispatch any inbound signal
    pub fn on_signal(&self, event: &SignalEvent) -> ArbitrationOutcome {
        match event {
            SignalEvent::Geofence(e) => self.on_geofence(e),
            SignalEvent::Beacon(e) => self.on_beacon(e),
            SignalEvent::Wifi(e) => self.on_wifi(e),
        }
    }

    fn apply(&self, effect: SignalEffect) -> ArbitrationOutcome {
        if effect.cancel {
            self.withdraw();
            return ArbitrationOutcome::Cancelled;
        }

        match effect.arbitrate {
            Some(reason) => self.evaluate(reason),
            None => ArbitrationOutcome::Ignored,
        }
    }

    /// Run one arbitration pass
    pub fn evaluate(&self, reason: TriggerReason) -> ArbitrationOutcome {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();

        self.store.sweep_expired(now);
        let snapshot = self.store.snapshot(now);
        let decision = self.policy.evaluate(&snapshot);
        let beacons = &decision.candidates;

        let beacons_detected = !beacons.is_empty();
        let wifi_only = snapshot.wifi.trusted && !beacons_detected;
        let geo_only =
            reason == TriggerReason::Geofence && snapshot.fence.in_zone && !wifi_only && !beacons_detected;

        if !beacons_detected && !wifi_only && !geo_only {
            tracing::debug!(reason = %reason, "Prompt blocked: no presence condition holds");
            state.presenting = None;
            self.sink.cancel();
            return ArbitrationOutcome::Denied;
        }

        if let Some(last) = state.last_shown_at {
            if now - last <= self.config.cooldown_ms() {
                tracing::debug!(reason = %reason, since_last_ms = now - last, "Prompt blocked: cooldown active");
                return ArbitrationOutcome::Suppressed;
            }
        }

        state.last_shown_at = Some(now);

        let target = if beacons.len() > 1 {
            let request = PresentSelectionRequest::from_sightings(beacons);
            tracing::info!(reason = %reason, beacons = beacons.len(), "Presenting merchant selection");
            self.sink.present_selection(request);
            PresentTarget::MultiBeaconSelection {
                candidates: beacons.len(),
            }
        } else if let Some(beacon) = beacons.first() {
            let request = PresentSingleRequest {
                title: beacon.name.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                message: VERIFIED_MERCHANT_MESSAGE.to_string(),
                trigger_reason: TriggerReason::Beacon,
                beacon: Some(BeaconTarget::from(beacon)),
                fence_id: String::new(),
                geo_flag: false,
                wifi_flag: false,
            };
            tracing::info!(
                reason = %reason,
                beacon = %beacon.identity,
                location_id = %beacon.location_id,
                "Presenting single merchant prompt"
            );
            self.sink.present_single(self.bind_context(request, &snapshot));
            PresentTarget::SingleBeacon(beacon.identity.clone())
        } else if wifi_only {
            tracing::info!(reason = %reason, "Presenting prompt on trusted Wi-Fi");
            let request = PresentSingleRequest::unbound(VERIFIED_MERCHANT_MESSAGE, TriggerReason::Wifi);
            self.sink.present_single(self.bind_context(request, &snapshot));
            PresentTarget::WifiOnly
        } else {
            tracing::info!(reason = %reason, fence_id = ?snapshot.fence.fence_id, "Presenting prompt on geofence entry");
            let request = PresentSingleRequest::unbound(ENTERED_AREA_MESSAGE, TriggerReason::Geofence);
            self.sink.present_single(self.bind_context(request, &snapshot));
            PresentTarget::GeofenceOnly
        };

        state.presenting = Some(target.clone());
        ArbitrationOutcome::Presented(target)
    }

    fn bind_context(&self, request: PresentSingleRequest, snapshot: &SignalSnapshot) -> PresentSingleRequest {
        request
            .with_fence(snapshot.fence.fence_id.as_deref())
            .with_flags(
                self.policy.config().geofence_satisfied(snapshot.fence.in_zone),
                snapshot.wifi.trusted,
            )
    }

    fn withdraw(&self) {
        let mut state = self.state.lock();
        state.presenting = None;
        tracing::debug!("Prompt withdrawn");
        self.sink.cancel();
    }

    /// The presenting surface was closed
    pub fn dismiss(&self) {
        self.withdraw();
    }

    /// Current phase, with cooldown judged at the current clock time
    pub fn phase(&self) -> ArbiterPhase {
        let now = self.clock.now_millis();
        let state = self.state.lock();
        match (&state.presenting, state.last_shown_at) {
            (Some(target), _) => ArbiterPhase::Presenting(target.clone()),
            (None, Some(last)) if now - last <= self.config.cooldown_ms() => ArbiterPhase::CooldownActive,
            _ => ArbiterPhase::Idle,
        }
    }

    /// Last time a prompt was emitted (unix millis)
    pub fn last_shown_at(&self) -> Option<i64> {
        self.state.lock().last_shown_at
    }

    /// Policy check for the scan path; never presents anything
    pub fn allowed_for_qr(&self) -> bool {
        self.describe_now().allow
    }

    /// Log-only evaluation when the app returns to the foreground; never presents
    pub fn on_app_resumed(&self) -> PolicyDescription {
        let description = self.describe_now();
        tracing::debug!(
            allow = description.allow,
            beacon_location = ?description.beacon_location,
            fence_location = ?description.fence_location,
            "App resumed"
        );
        description
    }

    fn describe_now(&self) -> PolicyDescription {
        let now = self.clock.now_millis();
        self.store.sweep_expired(now);
        self.policy.describe(&self.store.snapshot(now))
    }

    /// Resolve a selection pick and bind the live fence and Wi-Fi context
    ///
    /// The nonce comes from the live sighting when the beacon is still visible.
    pub fn resolve_selection(
        &self,
        request: &PresentSelectionRequest,
        key: &str,
    ) -> Result<PresentSingleRequest, SelectionError> {
        let resolved = request.resolve(key, self.registry.as_ref())?;
        let now = self.clock.now_millis();
        let snapshot = self.store.snapshot(now);

        let mut resolved = self.bind_context(resolved, &snapshot);
        if let Some(target) = resolved.beacon.as_mut() {
            target.nonce = self
                .store
                .sighting(&target.identity())
                .and_then(|s| s.nonce);
        }

        tracing::info!(key = %key, "Merchant selected");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{PromptEvent, RecordingSink};
    use contextpay_registry::InMemoryMerchantRegistry;
    use contextpay_types::{ManualClock, MerchantEntry};

    struct Harness {
        arbiter: TriggerArbiter,
        sink: Arc<RecordingSink>,
        clock: ManualClock,
    }

    fn harness(policy: PolicyConfig) -> Harness {
        let registry = InMemoryMerchantRegistry::new();
        registry.register_beacon(
            BeaconIdentity::new("uuid-A", 1, 1),
            MerchantEntry::new("Cafe A", "store-a", "m-a"),
        );
        registry.register_beacon(
            BeaconIdentity::new("uuid-B", 2, 2),
            MerchantEntry::new("Bakery B", "store-b", "m-b"),
        );

        let sink = Arc::new(RecordingSink::new());
        let clock = ManualClock::new(1_000_000);
        let arbiter = TriggerArbiter::new(
            Arc::new(SignalStore::new()),
            Arc::new(registry),
            sink.clone(),
            Arc::new(clock.clone()),
        )
        .with_policy(policy);

        Harness { arbiter, sink, clock }
    }

    fn beacon(uuid: &str, major: u16, minor: u16) -> BeaconEvent {
        BeaconEvent {
            uuid: uuid.to_string(),
            major,
            minor,
            nonce: None,
            rssi: -60,
        }
    }

    #[test]
    fn test_single_beacon_prompt() {
        let h = harness(PolicyConfig::default());
        h.arbiter.on_geofence(&GeofenceEvent { in_zone: true, fence_id: Some("STORE-A".into()) });
        h.clock.advance(5_000);

        let outcome = h.arbiter.on_beacon(&beacon("uuid-A", 1, 1));
        assert_eq!(
            outcome,
            ArbitrationOutcome::Presented(PresentTarget::SingleBeacon(BeaconIdentity::new("uuid-a", 1, 1)))
        );

        let Some(PromptEvent::PresentSingle(request)) = h.sink.presentations().pop() else {
            panic!("expected a single prompt");
        };
        assert_eq!(request.title, "Cafe A");
        assert_eq!(request.trigger_reason, TriggerReason::Beacon);
        assert_eq!(request.fence_id, "store-a");
        assert!(request.geo_flag);
        assert!(!request.wifi_flag);
        assert_eq!(request.beacon.unwrap().merchant_id, "m-a");
    }

    #[test]
    fn test_geofence_only_requires_geofence_event() {
        let h = harness(PolicyConfig::default());
        let outcome = h.arbiter.on_geofence(&GeofenceEvent { in_zone: true, fence_id: None });
        assert_eq!(outcome, ArbitrationOutcome::Presented(PresentTarget::GeofenceOnly));

        let Some(PromptEvent::PresentSingle(request)) = h.sink.presentations().pop() else {
            panic!("expected a geofence prompt");
        };
        assert_eq!(request.message, ENTERED_AREA_MESSAGE);
        assert_eq!(request.fence_id, "unknown");

        // A later pass for another reason does not fire on the stale fence flag
        h.clock.advance(10_000);
        assert_eq!(h.arbiter.evaluate(TriggerReason::Beacon), ArbitrationOutcome::Denied);
    }

    #[test]
    fn test_geofence_exit_cancels() {
        let h = harness(PolicyConfig::default());
        h.arbiter.on_geofence(&GeofenceEvent { in_zone: true, fence_id: None });
        h.sink.clear();

        h.clock.advance(500);
        let outcome = h.arbiter.on_geofence(&GeofenceEvent { in_zone: false, fence_id: None });
        assert_eq!(outcome, ArbitrationOutcome::Cancelled);
        assert!(h.sink.presentations().is_empty());
        assert_eq!(h.sink.cancel_count(), 1);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::CooldownActive);
    }

    #[test]
    fn test_geofence_exit_never_presents() {
        let h = harness(PolicyConfig::default());
        h.arbiter.on_wifi(&WifiEvent { trusted: true });
        h.sink.clear();

        h.clock.advance(3_001);
        let outcome = h.arbiter.on_geofence(&GeofenceEvent { in_zone: false, fence_id: None });
        assert_eq!(outcome, ArbitrationOutcome::Cancelled);
        assert_eq!(h.sink.events(), vec![PromptEvent::Cancel]);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Idle);
    }

    #[test]
    fn test_from_config_applies_beacon_timeout() {
        let config = TriggerConfig {
            beacon_timeout: std::time::Duration::from_secs(2),
            ..Default::default()
        };
        let clock = ManualClock::new(0);
        let arbiter = TriggerArbiter::from_config(
            config,
            Arc::new(InMemoryMerchantRegistry::new()),
            Arc::new(RecordingSink::new()),
            Arc::new(clock),
        );
        assert_eq!(arbiter.store().beacon_timeout_ms(), 2_000);
        assert_eq!(arbiter.config().beacon_timeout_ms(), 2_000);
    }

    #[test]
    fn test_wifi_loss_cancels_during_cooldown() {
        let h = harness(PolicyConfig::default());
        assert_eq!(
            h.arbiter.on_wifi(&WifiEvent { trusted: true }),
            ArbitrationOutcome::Presented(PresentTarget::WifiOnly)
        );

        h.clock.advance(100);
        assert_eq!(h.arbiter.on_wifi(&WifiEvent { trusted: false }), ArbitrationOutcome::Cancelled);
        assert_eq!(h.sink.cancel_count(), 1);
    }

    #[test]
    fn test_unknown_beacon_ignored() {
        let h = harness(PolicyConfig::default());
        assert_eq!(h.arbiter.on_beacon(&beacon("uuid-Z", 9, 9)), ArbitrationOutcome::Ignored);
        assert!(h.sink.events().is_empty());
        assert_eq!(h.arbiter.store().beacon_count(), 0);
    }

    #[test]
    fn test_cooldown_boundary() {
        let h = harness(PolicyConfig::default());
        h.arbiter.on_wifi(&WifiEvent { trusted: true });

        h.clock.advance(3_000);
        assert_eq!(h.arbiter.evaluate(TriggerReason::Wifi), ArbitrationOutcome::Suppressed);

        h.clock.advance(1);
        assert_eq!(
            h.arbiter.evaluate(TriggerReason::Wifi),
            ArbitrationOutcome::Presented(PresentTarget::WifiOnly)
        );
        assert_eq!(h.sink.presentations().len(), 2);
    }

    #[test]
    fn test_beacon_expiry_changes_branch() {
        let h = harness(PolicyConfig::default());
        h.arbiter.on_beacon(&beacon("uuid-A", 1, 1));
        h.arbiter.on_wifi(&WifiEvent { trusted: true });

        h.clock.advance(15_001);
        assert_eq!(
            h.arbiter.evaluate(TriggerReason::Wifi),
            ArbitrationOutcome::Presented(PresentTarget::WifiOnly)
        );
        assert_eq!(h.arbiter.store().beacon_count(), 0);
    }

    #[test]
    fn test_dismiss_returns_to_idle() {
        let h = harness(PolicyConfig::default());
        h.arbiter.on_wifi(&WifiEvent { trusted: true });
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Presenting(PresentTarget::WifiOnly));

        h.arbiter.dismiss();
        assert_eq!(h.arbiter.phase(), ArbiterPhase::CooldownActive);
        h.clock.advance(3_001);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Idle);
        assert_eq!(h.sink.cancel_count(), 1);
    }

    #[test]
    fn test_allowed_for_qr_and_resume_never_present() {
        let h = harness(PolicyConfig { force_geofence: true });
        assert!(!h.arbiter.allowed_for_qr());

        h.arbiter.store().observe_wifi(true);
        assert!(h.arbiter.allowed_for_qr());
        let described = h.arbiter.on_app_resumed();
        assert!(described.allow);
        assert!(described.geofence_ok);
        assert!(h.sink.events().is_empty());
    }

    #[test]
    fn test_resolve_selection_binds_live_context() {
        let h = harness(PolicyConfig::default());
        h.arbiter.on_geofence(&GeofenceEvent { in_zone: true, fence_id: Some("store-b".into()) });
        h.arbiter.on_beacon(&BeaconEvent { nonce: Some("n-42".into()), ..beacon("uuid-B", 2, 2) });
        h.arbiter.on_beacon(&beacon("uuid-A", 1, 1));

        let selection = PresentSelectionRequest::from_sightings(&h.arbiter.store().snapshot(0).beacons);
        let resolved = h.arbiter.resolve_selection(&selection, "uuid-b|2|2").unwrap();

        assert_eq!(resolved.trigger_reason, TriggerReason::BeaconSelected);
        assert_eq!(resolved.fence_id, "store-b");
        assert!(resolved.geo_flag);
        assert_eq!(resolved.beacon.unwrap().nonce.as_deref(), Some("n-42"));
    }
}
