//! Context token wire format
//!
//! ```text
//! base64url(payload_json) "." base64url(ed25519_signature)
//! ```
//!
//! Both segments are unpadded. The signature covers the canonical message
//! built by [`ContextPayload::canonical_message`], not the JSON bytes, so
//! JSON field order never affects verification.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use contextpay_crypto::{KeyId, SIGNATURE_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{IssueError, VerificationError};

/// Version line opening the canonical message
pub const CANONICAL_VERSION: &str = "ctxtok/v1";

/// Signed token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPayload {
    pub key_id: String,
    pub session_id: String,
    pub merchant_id: String,
    pub location_id: String,
    pub fence_id: String,
    #[serde(default)]
    pub nonce: Option<String>,
    /// Amount in minor units
    #[serde(default)]
    pub amount: Option<u64>,
    /// Expiry (unix seconds)
    pub expiry: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

impl ContextPayload {
    pub fn key_id(&self) -> KeyId {
        KeyId::from_string(self.key_id.clone())
    }

    /// Field-order-fixed message the signature covers
    ///
    /// Fails when a field contains a control character, since that would let
    /// one field's value impersonate the next line.
    pub fn canonical_message(&self) -> Result<String, IssueError> {
        let fields: [(&str, &str); 6] = [
            ("key_id", self.key_id.as_str()),
            ("session_id", self.session_id.as_str()),
            ("merchant_id", self.merchant_id.as_str()),
            ("location_id", self.location_id.as_str()),
            ("fence_id", self.fence_id.as_str()),
            ("nonce", self.nonce.as_deref().unwrap_or("")),
        ];

        let mut message = String::from(CANONICAL_VERSION);
        for (name, value) in fields {
            if value.chars().any(char::is_control) {
                return Err(IssueError::Serialization(format!(
                    "control character in {}",
                    name
                )));
            }
            message.push('\n');
            message.push_str(name);
            message.push('=');
            message.push_str(value);
        }

        if self.token_type.chars().any(char::is_control) {
            return Err(IssueError::Serialization("control character in type".to_string()));
        }

        let amount = self.amount.map(|a| a.to_string()).unwrap_or_default();
        message.push_str(&format!(
            "\namount={}\nexpiry={}\ntype={}",
            amount, self.expiry, self.token_type
        ));
        Ok(message)
    }
}

/// Issued, immutable context token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextToken {
    payload: ContextPayload,
    signature: [u8; SIGNATURE_LENGTH],
}

impl ContextToken {
    pub(crate) fn new(payload: ContextPayload, signature: [u8; SIGNATURE_LENGTH]) -> Self {
        Self { payload, signature }
    }

    pub fn payload(&self) -> &ContextPayload {
        &self.payload
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.signature
    }

    pub fn expiry(&self) -> i64 {
        self.payload.expiry
    }

    /// Render for display as a scannable code
    pub fn encode(&self) -> Result<String, IssueError> {
        let json = serde_json::to_vec(&self.payload)
            .map_err(|e| IssueError::Serialization(e.to_string()))?;
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(json),
            URL_SAFE_NO_PAD.encode(self.signature)
        ))
    }

    /// Parse the wire format; structural checks only
    pub fn decode(raw: &str) -> Result<Self, VerificationError> {
        let mut segments = raw.trim().split('.');
        let (payload_b64, signature_b64) = match (segments.next(), segments.next(), segments.next()) {
            (Some(p), Some(s), None) if !p.is_empty() && !s.is_empty() => (p, s),
            _ => {
                return Err(VerificationError::Malformed(
                    "expected two dot-separated segments".to_string(),
                ))
            }
        };

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| VerificationError::Malformed(format!("payload encoding: {}", e)))?;
        let payload: ContextPayload = serde_json::from_slice(&payload_bytes)
            .map_err(|e| VerificationError::Malformed(format!("payload: {}", e)))?;

        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| VerificationError::Malformed(format!("signature encoding: {}", e)))?;
        let signature: [u8; SIGNATURE_LENGTH] = signature_bytes.try_into().map_err(|bytes: Vec<u8>| {
            VerificationError::Malformed(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_LENGTH,
                bytes.len()
            ))
        })?;

        Ok(Self { payload, signature })
    }
}

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ContextPayload {
        ContextPayload {
            key_id: "key_0123".into(),
            session_id: "sess-1".into(),
            merchant_id: "m-1".into(),
            location_id: "store-1".into(),
            fence_id: "store-1".into(),
            nonce: None,
            amount: Some(4_500),
            expiry: 1_700_000_060,
            token_type: "account".into(),
        }
    }

    #[test]
    fn test_canonical_message_layout() {
        let message = payload().canonical_message().unwrap();
        assert_eq!(
            message,
            "ctxtok/v1\nkey_id=key_0123\nsession_id=sess-1\nmerchant_id=m-1\nlocation_id=store-1\n\
             fence_id=store-1\nnonce=\namount=4500\nexpiry=1700000060\ntype=account"
        );
    }

    #[test]
    fn test_control_characters_rejected() {
        let mut p = payload();
        p.location_id = "store-1\nexpiry=9999999999".into();
        assert!(matches!(p.canonical_message(), Err(IssueError::Serialization(_))));
    }

    #[test]
    fn test_encode_decode() {
        let token = ContextToken::new(payload(), [7u8; SIGNATURE_LENGTH]);
        let raw = token.encode().unwrap();
        assert_eq!(raw.matches('.').count(), 1);
        assert!(!raw.contains('='));

        let decoded = ContextToken::decode(&format!("{}\n", raw)).unwrap();
        assert_eq!(decoded, token);
        assert_eq!(decoded.to_string(), raw);
    }

    #[test]
    fn test_decode_rejects_structural_garbage() {
        let raw = ContextToken::new(payload(), [7u8; SIGNATURE_LENGTH]).encode().unwrap();
        let (body, sig) = raw.split_once('.').unwrap();

        let cases = vec![
            String::new(),
            "no-dot".to_string(),
            format!("{}.{}.extra", body, sig),
            format!(".{}", sig),
            format!("{}.!!!", body),
            format!("{}.{}", URL_SAFE_NO_PAD.encode(b"{\"key_id\":1}"), sig),
            format!("{}.{}", body, URL_SAFE_NO_PAD.encode([1u8; 63])),
        ];
        for case in cases {
            assert!(
                matches!(ContextToken::decode(&case), Err(VerificationError::Malformed(_))),
                "accepted {:?}",
                case
            );
        }
    }
}
