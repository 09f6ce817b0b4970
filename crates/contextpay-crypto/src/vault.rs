//! Session key provisioning for ContextPay
//!
//! **Security Invariant: Private keys NEVER leave the vault.**
//!
//! Token issuance needs a session key established with the merchant side.
//! The key exchange transport is external; [`SessionKeyProvider`] is the seam,
//! and [`SessionKeyVault`] is the in-process implementation.

use crate::{sign_message, CryptoError, CryptoResult, KeyId, KeyPair, PublicKey, SIGNATURE_LENGTH};
use parking_lot::RwLock;

/// Handle to an established session signing key
#[derive(Clone)]
pub struct SessionKey {
    key_id: KeyId,
    keypair: KeyPair,
}

impl SessionKey {
    /// Wrap a key pair, deriving the key ID from its public key
    pub fn new(keypair: KeyPair) -> Self {
        let key_id = KeyId::fingerprint(&PublicKey::from_keypair(&keypair));
        Self { key_id, keypair }
    }

    /// Wrap a key pair under an explicit key ID
    pub fn with_id(key_id: KeyId, keypair: KeyPair) -> Self {
        Self { key_id, keypair }
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_keypair(&self.keypair)
    }

    /// Sign a message with the session key
    pub fn sign(&self, message: &[u8]) -> CryptoResult<[u8; SIGNATURE_LENGTH]> {
        sign_message(&self.keypair, message)
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Source of session keys
#[async_trait::async_trait]
pub trait SessionKeyProvider: Send + Sync {
    /// Return the current session key, establishing one if needed
    async fn ensure_key(&self) -> CryptoResult<SessionKey>;
}

/// Metadata about the vault's current key
#[derive(Debug, Clone)]
pub struct KeyMetadata {
    pub key_id: KeyId,
    pub public_key: PublicKey,
    /// When the key was created (unix millis)
    pub created_at: i64,
}

struct VaultState {
    current: Option<(SessionKey, KeyMetadata)>,
    locked: bool,
}

/// In-memory session key vault
///
/// In production the key would come from a key-exchange service or a secure
/// enclave. The vault hands out [`SessionKey`] handles and never the seed.
pub struct SessionKeyVault {
    state: RwLock<VaultState>,
}

impl SessionKeyVault {
    /// Create an empty vault; the first `ensure_key` generates a key
    pub fn new() -> Self {
        Self {
            state: RwLock::new(VaultState {
                current: None,
                locked: false,
            }),
        }
    }

    /// Create a vault holding an imported key (from secure backup)
    pub fn with_key(keypair: KeyPair) -> Self {
        let vault = Self::new();
        vault.install(SessionKey::new(keypair));
        vault
    }

    /// Public half of the current key, if one has been established
    pub fn current_public_key(&self) -> Option<PublicKey> {
        self.state
            .read()
            .current
            .as_ref()
            .map(|(_, meta)| meta.public_key.clone())
    }

    /// Metadata of the current key
    pub fn metadata(&self) -> Option<KeyMetadata> {
        self.state.read().current.as_ref().map(|(_, meta)| meta.clone())
    }

    /// Replace the current key with a freshly generated one
    pub fn rotate(&self) -> CryptoResult<PublicKey> {
        if self.state.read().locked {
            return Err(CryptoError::VaultError("vault is locked".to_string()));
        }
        let key = SessionKey::new(KeyPair::generate());
        let public = key.public_key();
        tracing::info!(key_id = %key.key_id(), "Session key rotated");
        self.install(key);
        Ok(public)
    }

    /// Refuse to hand out keys until unlocked
    pub fn lock(&self) {
        self.state.write().locked = true;
    }

    pub fn unlock(&self) {
        self.state.write().locked = false;
    }

    fn install(&self, key: SessionKey) {
        let meta = KeyMetadata {
            key_id: key.key_id().clone(),
            public_key: key.public_key(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.state.write().current = Some((key, meta));
    }
}

impl Default for SessionKeyVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionKeyProvider for SessionKeyVault {
    async fn ensure_key(&self) -> CryptoResult<SessionKey> {
        let mut state = self.state.write();
        if state.locked {
            return Err(CryptoError::VaultError("vault is locked".to_string()));
        }

        if let Some((key, _)) = state.current.as_ref() {
            return Ok(key.clone());
        }

        let key = SessionKey::new(KeyPair::generate());
        let meta = KeyMetadata {
            key_id: key.key_id().clone(),
            public_key: key.public_key(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        tracing::debug!(key_id = %meta.key_id, "Session key established");
        state.current = Some((key.clone(), meta));
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify_message;

    #[tokio::test]
    async fn test_ensure_key_is_stable() {
        let vault = SessionKeyVault::new();
        assert!(vault.current_public_key().is_none());

        let first = vault.ensure_key().await.unwrap();
        let second = vault.ensure_key().await.unwrap();
        assert_eq!(first.key_id(), second.key_id());
        assert_eq!(vault.current_public_key(), Some(first.public_key()));
    }

    #[tokio::test]
    async fn test_imported_key_signs_verifiably() {
        let keypair = KeyPair::generate();
        let expected = PublicKey::from_keypair(&keypair);
        let vault = SessionKeyVault::with_key(keypair);

        let key = vault.ensure_key().await.unwrap();
        assert_eq!(key.public_key(), expected);

        let sig = key.sign(b"payload").unwrap();
        assert!(verify_message(&expected, b"payload", &sig).unwrap());
    }

    #[tokio::test]
    async fn test_locked_vault_refuses_keys() {
        let vault = SessionKeyVault::new();
        vault.lock();
        assert!(matches!(vault.ensure_key().await, Err(CryptoError::VaultError(_))));
        assert!(vault.rotate().is_err());

        vault.unlock();
        assert!(vault.ensure_key().await.is_ok());
    }

    #[tokio::test]
    async fn test_rotate_changes_key() {
        let vault = SessionKeyVault::new();
        let before = vault.ensure_key().await.unwrap().public_key();
        let after = vault.rotate().unwrap();
        assert_ne!(before, after);
        assert_eq!(vault.ensure_key().await.unwrap().public_key(), after);
    }
}
