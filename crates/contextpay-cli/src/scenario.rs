//! Scenario replay
//!
//! A scenario is a JSON list of steps run against a [`TriggerArbiter`] on a
//! manual clock:
//!
//! ```json
//! {
//!   "steps": [
//!     { "action": "signal", "event": { "type": "geofence", "in_zone": true, "fence_id": "store-a" } },
//!     { "action": "advance", "ms": 3001 },
//!     { "action": "beacon_batch", "beacons": [ { "uuid": "…", "major": 1, "minor": 1, "rssi": -60 } ] },
//!     { "action": "select", "key": "…|1|1" },
//!     { "action": "dismiss" }
//!   ]
//! }
//! ```

use std::sync::Arc;

use contextpay_crypto::SessionKeyVault;
use contextpay_policy::PolicyConfig;
use contextpay_prompt::{PromptSession, TokenState};
use contextpay_registry::MerchantRegistry;
use contextpay_token::TokenIssuer;
use contextpay_trigger::{
    ArbitrationOutcome, ChannelSink, PresentSelectionRequest, PresentSingleRequest, PromptEvent,
    TriggerArbiter,
};
use contextpay_types::{BeaconEvent, Clock, ManualClock, SignalEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::AppConfig;

/// Default replay start, 2024-01-01T00:00:00Z
pub const DEFAULT_START_MS: i64 = 1_704_067_200_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_start")]
    pub start_ms: i64,
    pub steps: Vec<ScenarioStep>,
}

fn default_start() -> i64 {
    DEFAULT_START_MS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    Advance { ms: i64 },
    Signal { event: SignalEvent },
    BeaconBatch { beacons: Vec<BeaconEvent> },
    /// Pick a merchant from the most recent selection prompt
    Select { key: String },
    Dismiss,
}

/// What one step produced
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: usize,
    pub at_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ArbitrationOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<PromptEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sessions: Vec<SessionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of opening a prompt for a presented request
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub admitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

struct TokenBinding {
    vault: SessionKeyVault,
    issuer: TokenIssuer,
}

pub struct ScenarioRunner {
    arbiter: TriggerArbiter,
    prompts: UnboundedReceiver<PromptEvent>,
    clock: ManualClock,
    policy: PolicyConfig,
    last_selection: Option<PresentSelectionRequest>,
    tokens: Option<TokenBinding>,
}

impl ScenarioRunner {
    pub fn new(config: &AppConfig, registry: Arc<dyn MerchantRegistry>, start_ms: i64) -> Self {
        let clock = ManualClock::new(start_ms);
        let (sink, prompts) = ChannelSink::new();
        let arbiter = TriggerArbiter::from_config(
            config.trigger.clone(),
            registry,
            Arc::new(sink),
            Arc::new(clock.clone()),
        )
        .with_policy(config.policy.clone());

        Self {
            arbiter,
            prompts,
            clock,
            policy: config.policy.clone(),
            last_selection: None,
            tokens: None,
        }
    }

    /// Issue a token for every admitted prompt, signed by `vault`
    pub fn with_tokens(mut self, vault: SessionKeyVault, issuer: TokenIssuer) -> Self {
        self.tokens = Some(TokenBinding { vault, issuer });
        self
    }

    pub async fn run(&mut self, scenario: &Scenario) -> Vec<StepRecord> {
        let mut records = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            records.push(self.step(index, step).await);
        }
        records
    }

    async fn step(&mut self, index: usize, step: &ScenarioStep) -> StepRecord {
        let mut record = StepRecord {
            step: index,
            at_ms: self.clock.now_millis(),
            outcome: None,
            prompts: Vec::new(),
            sessions: Vec::new(),
            error: None,
        };

        match step {
            ScenarioStep::Advance { ms } => {
                self.clock.advance(*ms);
                record.at_ms = self.clock.now_millis();
            }
            ScenarioStep::Signal { event } => {
                record.outcome = Some(self.arbiter.on_signal(event));
            }
            ScenarioStep::BeaconBatch { beacons } => {
                record.outcome = Some(self.arbiter.on_beacon_batch(beacons));
            }
            ScenarioStep::Dismiss => self.arbiter.dismiss(),
            ScenarioStep::Select { key } => match &self.last_selection {
                Some(selection) => match self.arbiter.resolve_selection(selection, key) {
                    Ok(request) => record.prompts.push(PromptEvent::PresentSingle(request)),
                    Err(e) => record.error = Some(e.to_string()),
                },
                None => record.error = Some("no selection prompt to pick from".to_string()),
            },
        }

        while let Ok(event) = self.prompts.try_recv() {
            record.prompts.push(event);
        }

        for event in &record.prompts {
            match event {
                PromptEvent::PresentSingle(request) => {
                    let session = self.open_session(request.clone(), index).await;
                    record.sessions.push(session);
                }
                PromptEvent::PresentSelection(selection) => {
                    self.last_selection = Some(selection.clone());
                }
                PromptEvent::Cancel => {}
            }
        }

        record
    }

    async fn open_session(&self, request: PresentSingleRequest, step: usize) -> SessionRecord {
        let mut session = match PromptSession::open(request, &self.policy) {
            Ok(session) => session,
            Err(e) => {
                return SessionRecord {
                    admitted: false,
                    reason: Some(e.to_string()),
                    token: None,
                }
            }
        };

        let mut record = SessionRecord {
            admitted: true,
            reason: None,
            token: None,
        };

        if let Some(binding) = &self.tokens {
            let session_id = format!("replay-{}", step);
            match session.issue_token(&binding.vault, &binding.issuer, &session_id).await {
                TokenState::Ready(token) => match token.encode() {
                    Ok(raw) => record.token = Some(raw),
                    Err(e) => record.reason = Some(e.to_string()),
                },
                TokenState::Unavailable(reason) => record.reason = Some(reason.clone()),
                TokenState::Pending => {}
            }
        }

        record
    }
}
