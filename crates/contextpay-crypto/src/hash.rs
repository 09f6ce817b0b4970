//! Hashing utilities for ContextPay

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Short digest suitable for audit logs (first 8 bytes, hex)
///
/// Tokens are bearer artifacts, so logs carry this instead of the token.
pub fn audit_digest(data: &[u8]) -> String {
    hex::encode(&sha256(data)[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let hash = sha256_hex(b"Hello, ContextPay!");
        assert_eq!(hash.len(), 64); // 32 bytes = 64 hex chars
    }

    #[test]
    fn test_audit_digest_is_prefix_of_full_hash() {
        let data = b"token-bytes";
        let digest = audit_digest(data);
        assert_eq!(digest.len(), 16);
        assert!(sha256_hex(data).starts_with(&digest));
    }
}
