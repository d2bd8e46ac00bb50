//! # Signing
//!
//! Ed25519 detached signatures. Every public identity in this crate is a
//! 32-byte Ed25519 verifying key; private key material is accepted either
//! as a 32-byte seed or a 64-byte expanded secret key (seed || public key),
//! matching the two forms callers commonly hold key material in.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::{Error, Result};

/// Width in bytes of a detached Ed25519 signature.
pub const SIGNATURE_SIZE: usize = 64;

/// Width in bytes of an Ed25519 public key.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Parse a private key from either a 32-byte seed or a 64-byte expanded
/// secret key (seed || public key — only the first 32 bytes are used).
pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey> {
    match bytes.len() {
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        64 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes[..32]);
            Ok(SigningKey::from_bytes(&seed))
        }
        n => Err(Error::InvalidKey(format!(
            "expected a 32-byte seed or 64-byte expanded secret key, got {n} bytes"
        ))),
    }
}

/// Parse a 32-byte Ed25519 public key.
pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::InvalidKey(format!("public key must be 32 bytes, got {}", bytes.len())))?;
    VerifyingKey::from_bytes(&arr)
        .map_err(|e| Error::InvalidKey(format!("malformed public key: {e}")))
}

/// Sign `message` with a private key given as a 32-byte seed or 64-byte
/// expanded secret key. Returns the 64-byte detached signature.
pub fn sign(private_key: &[u8], message: &[u8]) -> Result<[u8; SIGNATURE_SIZE]> {
    let signing_key = signing_key_from_bytes(private_key)?;
    Ok(signing_key.sign(message).to_bytes())
}

/// Derive the 32-byte Ed25519 public key that corresponds to a private key
/// given as a 32-byte seed or 64-byte expanded secret key.
pub fn derive_public_key(private_key: &[u8]) -> Result<[u8; PUBLIC_KEY_SIZE]> {
    let signing_key = signing_key_from_bytes(private_key)?;
    Ok(signing_key.verifying_key().to_bytes())
}

/// Verify a detached signature over `message` against `public_key`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let verifying_key = verifying_key_from_bytes(public_key)?;
    let sig_bytes: [u8; SIGNATURE_SIZE] = signature.try_into().map_err(|_| {
        Error::SignatureInvalid(format!(
            "signature must be {SIGNATURE_SIZE} bytes, got {}",
            signature.len()
        ))
    })?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| Error::SignatureInvalid("signature did not verify".into()))
}

/// Reject obviously-invalid key material: wrong length, all-zero, or
/// all-0xFF. This does not prove a key is a valid curve point — invalid
/// points are caught by [`verifying_key_from_bytes`] itself.
pub fn validate_key_bytes(bytes: &[u8]) -> Result<()> {
    if bytes.len() != 32 && bytes.len() != 64 {
        return Err(Error::InvalidKey(format!(
            "expected 32 or 64 bytes, got {}",
            bytes.len()
        )));
    }
    if bytes.iter().all(|&b| b == 0x00) {
        return Err(Error::InvalidKey("key is all-zero".into()));
    }
    if bytes.iter().all(|&b| b == 0xFF) {
        return Err(Error::InvalidKey("key is all-0xFF".into()));
    }
    Ok(())
}
