//! Token verification against a captured physical context
//!
//! Checks run in a fixed order and the first failure is terminal:
//! structure, target context, merchant key, signature, location, fence,
//! nonce, expiry.

use std::sync::Arc;

use contextpay_crypto::{audit_digest, verify_message};
use contextpay_registry::MerchantRegistry;
use contextpay_types::{Clock, UNKNOWN_FENCE};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::config::VerifierConfig;
use crate::error::VerificationError;
use crate::token::{ContextPayload, ContextToken};

/// Locally trusted context captured when a prompt opened
///
/// Held immutable for the lifetime of the prompt and never re-derived from
/// live signal state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationContext {
    pub target_uuid: Option<String>,
    pub target_location_id: Option<String>,
    pub target_merchant_id: Option<String>,
    pub target_nonce: Option<String>,
    /// Lowercased fence id, `None` when no fence was reported
    pub fence_id: Option<String>,
}

impl VerificationContext {
    /// Fence id if one is actually known
    pub fn known_fence(&self) -> Option<&str> {
        self.fence_id
            .as_deref()
            .filter(|f| !f.is_empty() && *f != UNKNOWN_FENCE)
    }
}

/// A token that passed every check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub payload: ContextPayload,
    /// Short digest of the raw token for audit trails
    pub digest: String,
}

/// Verifies scanned tokens
pub struct TokenVerifier {
    registry: Arc<dyn MerchantRegistry>,
    clock: Arc<dyn Clock>,
    config: VerifierConfig,
}

impl TokenVerifier {
    pub fn new(registry: Arc<dyn MerchantRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            clock,
            config: VerifierConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify `raw` against `context`; every error is a deny
    pub fn verify(
        &self,
        raw: &str,
        context: &VerificationContext,
    ) -> Result<VerifiedToken, VerificationError> {
        let digest = audit_digest(raw.trim().as_bytes());

        match self.check(raw, context) {
            Ok(payload) => {
                tracing::info!(
                    merchant_id = %payload.merchant_id,
                    location_id = %payload.location_id,
                    fence_id = ?context.fence_id,
                    digest = %digest,
                    "Token verified"
                );
                Ok(VerifiedToken { payload, digest })
            }
            Err(e) => {
                tracing::warn!(code = e.code(), reason = %e, digest = %digest, "Token rejected");
                Err(e)
            }
        }
    }

    fn check(
        &self,
        raw: &str,
        context: &VerificationContext,
    ) -> Result<ContextPayload, VerificationError> {
        let token = ContextToken::decode(raw)?;
        let message = token
            .payload()
            .canonical_message()
            .map_err(|e| VerificationError::Malformed(e.to_string()))?;

        if self.config.require_target_beacon && context.target_uuid.is_none() {
            return Err(VerificationError::MissingTargetContext);
        }

        let payload = token.payload();
        let public_key = self
            .registry
            .merchant_public_key(&payload.merchant_id)
            .ok_or_else(|| VerificationError::UnknownMerchant(payload.merchant_id.clone()))?;

        let valid = verify_message(&public_key, message.as_bytes(), token.signature())
            .map_err(|_| VerificationError::InvalidSignature)?;
        if !valid {
            return Err(VerificationError::InvalidSignature);
        }

        if let Some(expected) = context.target_location_id.as_deref() {
            if payload.location_id != expected {
                return Err(VerificationError::LocationMismatch {
                    token: payload.location_id.clone(),
                    expected: expected.to_string(),
                });
            }
        }

        if let Some(fence) = context.known_fence() {
            if !payload.location_id.eq_ignore_ascii_case(fence) {
                return Err(VerificationError::FenceMismatch {
                    token: payload.location_id.clone(),
                    fence: fence.to_string(),
                });
            }
        }

        let token_nonce = payload.nonce.as_deref().unwrap_or("");
        let expected_nonce = context.target_nonce.as_deref().unwrap_or("");
        if self.config.require_nonce && (token_nonce.is_empty() || expected_nonce.is_empty()) {
            return Err(VerificationError::NonceMismatch);
        }
        if !bool::from(token_nonce.as_bytes().ct_eq(expected_nonce.as_bytes())) {
            return Err(VerificationError::NonceMismatch);
        }

        let now = self.clock.now_secs();
        if payload.expiry < now {
            return Err(VerificationError::Expired {
                expiry: payload.expiry,
                now,
            });
        }

        Ok(token.payload().clone())
    }
}
