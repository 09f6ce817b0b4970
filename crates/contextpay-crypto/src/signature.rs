//! Digital signatures for ContextPay
//!
//! Signatures are raw 64-byte Ed25519 signatures. Encoding them for
//! transport is the caller's job.

use crate::{CryptoError, CryptoResult, KeyPair, PublicKey};
use ed25519_dalek::{Signature as Ed25519Signature, Signer, Verifier};

/// Length of an Ed25519 signature in bytes
pub const SIGNATURE_LENGTH: usize = 64;

/// Sign a message with a key pair
pub fn sign_message(keypair: &KeyPair, message: &[u8]) -> CryptoResult<[u8; SIGNATURE_LENGTH]> {
    let signature = keypair
        .signing_key()
        .try_sign(message)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    Ok(signature.to_bytes())
}

/// Verify a raw signature against a public key
///
/// Returns `Ok(false)` when the signature does not match and an error only
/// when the inputs are structurally unusable.
pub fn verify_message(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> CryptoResult<bool> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::VerificationFailed(format!(
            "Signature must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            signature.len()
        )));
    }

    let mut sig_array = [0u8; SIGNATURE_LENGTH];
    sig_array.copy_from_slice(signature);

    let signature = Ed25519Signature::from_bytes(&sig_array);
    let verifying_key = public_key.to_verifying_key()?;

    match verifying_key.verify(message, &signature) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
