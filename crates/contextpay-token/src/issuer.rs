//! Token issuance

use std::sync::Arc;

use contextpay_crypto::{audit_digest, SessionKey, SessionKeyProvider};
use contextpay_types::Clock;

use crate::config::TokenConfig;
use crate::error::{IssueError, IssueResult};
use crate::token::{ContextPayload, ContextToken};

/// Context the token binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub session_id: String,
    pub merchant_id: String,
    pub location_id: String,
    pub fence_id: String,
    pub nonce: Option<String>,
    /// Amount in minor units
    pub amount: Option<u64>,
}

/// Builds and signs context tokens
pub struct TokenIssuer {
    config: TokenConfig,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Sign a token with an established session key
    pub fn issue(&self, key: &SessionKey, request: TokenRequest) -> IssueResult<ContextToken> {
        let expiry = self
            .clock
            .now_secs()
            .saturating_add(self.config.lifetime_secs());

        let payload = ContextPayload {
            key_id: key.key_id().to_string(),
            session_id: request.session_id,
            merchant_id: request.merchant_id,
            location_id: request.location_id,
            fence_id: request.fence_id,
            nonce: request.nonce,
            amount: request.amount,
            expiry,
            token_type: self.config.token_type.clone(),
        };

        let message = payload.canonical_message()?;
        let signature = key
            .sign(message.as_bytes())
            .map_err(|e| IssueError::Signing(e.to_string()))?;

        let token = ContextToken::new(payload, signature);
        let encoded = token.encode()?;
        tracing::info!(
            key_id = %key.key_id(),
            merchant_id = %token.payload().merchant_id,
            location_id = %token.payload().location_id,
            expiry,
            digest = %audit_digest(encoded.as_bytes()),
            "Context token issued"
        );
        Ok(token)
    }

    /// Establish a session key through `provider`, then sign
    pub async fn issue_with_provider(
        &self,
        provider: &dyn SessionKeyProvider,
        request: TokenRequest,
    ) -> IssueResult<ContextToken> {
        let key = provider.ensure_key().await.map_err(|e| {
            tracing::warn!(error = %e, "Session key unavailable; token not issued");
            IssueError::KeyUnavailable(e.to_string())
        })?;
        self.issue(&key, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextpay_crypto::{CryptoError, CryptoResult, KeyPair, SessionKeyVault};
    use contextpay_types::ManualClock;

    fn request() -> TokenRequest {
        TokenRequest {
            session_id: "sess-1".into(),
            merchant_id: "m-1".into(),
            location_id: "store-1".into(),
            fence_id: "store-1".into(),
            nonce: None,
            amount: None,
        }
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl SessionKeyProvider for FailingProvider {
        async fn ensure_key(&self) -> CryptoResult<SessionKey> {
            Err(CryptoError::KeyNotFound("key exchange offline".into()))
        }
    }

    #[test]
    fn test_expiry_follows_lifetime() {
        let clock = ManualClock::new(1_700_000_000_500);
        let issuer = TokenIssuer::new(TokenConfig::default(), Arc::new(clock));
        let key = SessionKey::new(KeyPair::generate());

        let token = issuer.issue(&key, request()).unwrap();
        assert_eq!(token.expiry(), 1_700_000_060);
        assert_eq!(token.payload().key_id, key.key_id().to_string());
        assert_eq!(token.payload().token_type, "account");
    }

    #[test]
    fn test_control_character_is_serialization_error() {
        let issuer = TokenIssuer::new(TokenConfig::default(), Arc::new(ManualClock::new(0)));
        let key = SessionKey::new(KeyPair::generate());
        let mut bad = request();
        bad.merchant_id = "m-1\u{0}".into();

        assert!(matches!(issuer.issue(&key, bad), Err(IssueError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_issue_with_provider() {
        let issuer = TokenIssuer::new(TokenConfig::default(), Arc::new(ManualClock::new(0)));
        let vault = SessionKeyVault::new();

        let token = issuer.issue_with_provider(&vault, request()).await.unwrap();
        let key_id = vault.metadata().unwrap().key_id;
        assert_eq!(token.payload().key_id, key_id.to_string());
    }

    #[tokio::test]
    async fn test_provider_failure_is_key_unavailable() {
        let issuer = TokenIssuer::new(TokenConfig::default(), Arc::new(ManualClock::new(0)));
        let result = issuer.issue_with_provider(&FailingProvider, request()).await;
        assert!(matches!(result, Err(IssueError::KeyUnavailable(_))));
    }
}
