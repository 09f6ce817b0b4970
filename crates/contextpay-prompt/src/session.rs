//! Prompt session lifecycle

use contextpay_crypto::SessionKeyProvider;
use contextpay_policy::{AdmissionFacts, AdmissionVerdict, PolicyConfig, PolicyEvaluator};
use contextpay_token::{
    ContextToken, TokenIssuer, TokenRequest, TokenVerifier, VerificationContext, VerificationError,
    VerifiedToken,
};
use contextpay_trigger::PresentSingleRequest;
use contextpay_types::{TriggerReason, UNKNOWN_FENCE};
use thiserror::Error;

use crate::launch::{LaunchError, PaymentApp, PaymentAppLauncher};
use crate::trace::{SessionStage, SessionTrace};

/// Merchant id used when the prompt has no target beacon
pub const UNKNOWN_MERCHANT: &str = "merchant_unknown";

const TRACE_MAX_ENTRIES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("Prompt not admitted for trigger {trigger}: need geofence and beacon, trusted Wi-Fi, or a user action")]
    NotAdmitted { trigger: TriggerReason },

    #[error("Location conflict: beacon={beacon_location} fence={fence_id}")]
    LocationConflict {
        beacon_location: String,
        fence_id: String,
    },
}

/// Token slot shown on the prompt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TokenState {
    #[default]
    Pending,
    Ready(ContextToken),
    /// Issuance failed; the prompt shows "token unavailable"
    Unavailable(String),
}

impl TokenState {
    pub fn token(&self) -> Option<&ContextToken> {
        match self {
            TokenState::Ready(token) => Some(token),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, TokenState::Ready(_))
    }
}

/// One opened payment prompt
///
/// The verification context is captured in [`PromptSession::open`] and is
/// read-only afterwards.
#[derive(Debug)]
pub struct PromptSession {
    prompt_id: String,
    request: PresentSingleRequest,
    context: VerificationContext,
    amount: Option<u64>,
    token: TokenState,
    closed: bool,
    trace: SessionTrace,
}

impl PromptSession {
    /// Apply the admission rule and capture the verification context
    pub fn open(request: PresentSingleRequest, policy: &PolicyConfig) -> Result<Self, AdmissionError> {
        let evaluator = PolicyEvaluator::new(policy.clone());
        let facts = AdmissionFacts {
            trigger: request.trigger_reason,
            geo_flag: request.geo_flag,
            wifi_flag: request.wifi_flag,
            beacon_location: request.beacon.as_ref().map(|b| b.location_id.as_str()),
            has_beacon: request.beacon.is_some(),
            fence_id: &request.fence_id,
        };

        match evaluator.admit(&facts) {
            AdmissionVerdict::Admitted => {}
            AdmissionVerdict::NotAdmitted => {
                return Err(AdmissionError::NotAdmitted {
                    trigger: request.trigger_reason,
                })
            }
            AdmissionVerdict::LocationConflict {
                beacon_location,
                fence_id,
            } => {
                return Err(AdmissionError::LocationConflict {
                    beacon_location,
                    fence_id,
                })
            }
        }

        let context = capture_context(&request);
        let prompt_id = format!("prompt_{}", uuid::Uuid::new_v4());

        let mut trace = SessionTrace::new(&prompt_id, Some(TRACE_MAX_ENTRIES));
        trace.record(
            SessionStage::Admission,
            "prompt admitted",
            Some(serde_json::json!({
                "trigger": request.trigger_reason,
                "geo": request.geo_flag,
                "wifi": request.wifi_flag,
                "fence_id": request.fence_id,
                "target_uuid": context.target_uuid,
            })),
        );
        tracing::info!(
            prompt_id = %prompt_id,
            trigger = %request.trigger_reason,
            location_id = ?context.target_location_id,
            fence_id = %request.fence_id,
            "Payment prompt opened"
        );

        Ok(Self {
            prompt_id,
            request,
            context,
            amount: None,
            token: TokenState::Pending,
            closed: false,
            trace,
        })
    }

    /// Bind an amount (minor units) into tokens issued after this call
    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn prompt_id(&self) -> &str {
        &self.prompt_id
    }

    pub fn title(&self) -> &str {
        &self.request.title
    }

    pub fn message(&self) -> &str {
        &self.request.message
    }

    pub fn request(&self) -> &PresentSingleRequest {
        &self.request
    }

    pub fn context(&self) -> &VerificationContext {
        &self.context
    }

    pub fn token_state(&self) -> &TokenState {
        &self.token
    }

    pub fn trace(&self) -> &SessionTrace {
        &self.trace
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Issue this prompt's token through the session key provider
    ///
    /// Failure leaves the prompt open with [`TokenState::Unavailable`].
    pub async fn issue_token(
        &mut self,
        provider: &dyn SessionKeyProvider,
        issuer: &TokenIssuer,
        session_id: &str,
    ) -> &TokenState {
        let request = TokenRequest {
            session_id: session_id.to_string(),
            merchant_id: self
                .context
                .target_merchant_id
                .clone()
                .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string()),
            location_id: self
                .context
                .target_location_id
                .clone()
                .unwrap_or_else(|| self.request.fence_id.clone()),
            fence_id: self.request.fence_id.clone(),
            nonce: self.context.target_nonce.clone(),
            amount: self.amount,
        };

        self.token = match issuer.issue_with_provider(provider, request).await {
            Ok(token) => {
                self.trace.record(
                    SessionStage::Token,
                    "token issued",
                    Some(serde_json::json!({
                        "merchant_id": token.payload().merchant_id,
                        "location_id": token.payload().location_id,
                        "expiry": token.expiry(),
                    })),
                );
                TokenState::Ready(token)
            }
            Err(e) => {
                tracing::error!(prompt_id = %self.prompt_id, error = %e, "Token generation failed");
                self.trace.record(
                    SessionStage::Token,
                    "token unavailable",
                    Some(serde_json::json!({ "error": e.to_string() })),
                );
                TokenState::Unavailable(e.to_string())
            }
        };
        &self.token
    }

    /// Verify a scanned code against the captured context
    pub fn verify_scanned(
        &mut self,
        raw: &str,
        verifier: &TokenVerifier,
    ) -> Result<VerifiedToken, VerificationError> {
        let result = verifier.verify(raw, &self.context);
        let data = match &result {
            Ok(verified) => serde_json::json!({ "ok": true, "digest": verified.digest }),
            Err(e) => serde_json::json!({ "ok": false, "code": e.code() }),
        };
        self.trace.record(SessionStage::Verify, "scanned code checked", Some(data));
        result
    }

    /// Hand the payment off to `app`
    pub fn launch(&mut self, app: PaymentApp, launcher: &dyn PaymentAppLauncher) -> Result<(), LaunchError> {
        if self.closed {
            return Err(LaunchError::SessionClosed);
        }

        let result = launcher.launch(app);
        match &result {
            Ok(()) => {
                tracing::info!(prompt_id = %self.prompt_id, app = %app, "Payment app launched");
                self.trace.record(
                    SessionStage::Launch,
                    "payment app launched",
                    Some(serde_json::json!({ "app": app })),
                );
            }
            Err(e) => {
                tracing::warn!(prompt_id = %self.prompt_id, app = %app, error = %e, "Payment app launch failed");
                self.trace.record(
                    SessionStage::Launch,
                    "payment app launch failed",
                    Some(serde_json::json!({ "app": app, "error": e.to_string() })),
                );
            }
        }
        result
    }

    /// Close the prompt; later launches are refused
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.trace.record(SessionStage::Close, "prompt closed", None);
        tracing::debug!(prompt_id = %self.prompt_id, "Payment prompt closed");
    }
}

fn capture_context(request: &PresentSingleRequest) -> VerificationContext {
    let fence_id = Some(request.fence_id.to_lowercase())
        .filter(|f| !f.is_empty() && f.as_str() != UNKNOWN_FENCE);

    match &request.beacon {
        Some(target) => VerificationContext {
            target_uuid: Some(target.uuid.clone()),
            target_location_id: Some(target.location_id.clone()),
            target_merchant_id: Some(target.merchant_id.clone()),
            target_nonce: target.nonce.clone(),
            fence_id,
        },
        None => VerificationContext {
            fence_id,
            ..Default::default()
        },
    }
}
