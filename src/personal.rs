//! # Personal Cipher
//!
//! Self-encryption under a single secret only the owner holds: backups,
//! local drafts, anything with exactly one reader who is also the writer.
//!
//! Each call to [`encrypt_personal`] draws a fresh random salt and derives
//! a one-time payload key from `(secret, salt)` via the crate's iterated
//! SHA-256 KDF, so no two ciphertexts ever use the same key even when the
//! same secret encrypts repeatedly. The salt, IV and protocol version are
//! mirrored into the envelope's metadata alongside the frame itself; on
//! decrypt, [`decrypt_personal`] cross-checks metadata against the parsed
//! frame and refuses to proceed on any disagreement, since metadata is
//! the part of the envelope a careless re-serialization is most likely to
//! corrupt or a tamperer most likely to edit in isolation.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::crypto::{self, aead, base58};
use crate::envelope::{build_salted_frame, parse_salted_frame, Envelope, Mode, VERSION_V1};
use crate::error::{Error, Result};

/// Non-secret metadata carried alongside a Personal envelope's frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalMetadata {
    /// Base58 of the 32-byte salt also embedded in the frame.
    pub salt: String,
    /// Base58 of the 16-byte IV also embedded in the frame (legacy name
    /// for the AEAD nonce).
    pub nonce: String,
    pub timestamp: u64,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<bool>,
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs()
}

fn random_salt() -> [u8; 32] {
    use rand::RngCore;
    let mut s = [0u8; 32];
    rand_core::OsRng.fill_bytes(&mut s);
    s
}

/// A validated personal key, held for the lifetime of a session of
/// encrypt/decrypt calls.
pub struct PersonalSession {
    key: Vec<u8>,
}

impl PersonalSession {
    /// Validate and wrap `key` (32 or 64 bytes, not all-zero or all-0xFF).
    pub fn new(key: &[u8]) -> Result<Self> {
        validate_personal_key(key)?;
        Ok(PersonalSession { key: key.to_vec() })
    }

    /// Encrypt `plaintext` into an envelope under this session's key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope> {
        encrypt_personal(&self.key, plaintext)
    }

    /// Encrypt `plaintext`, compressing it first if `compress` is set.
    pub fn encrypt_with(&self, plaintext: &[u8], compress: bool) -> Result<Envelope> {
        encrypt_personal_with(&self.key, plaintext, compress)
    }

    /// Decrypt an envelope previously produced by [`PersonalSession::encrypt`]
    /// (or [`encrypt_personal`]) under this session's key.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        decrypt_personal(&self.key, envelope)
    }
}

/// Reject obviously-invalid personal key material. Rejects empty input,
/// any length other than 32 or 64 bytes, and the all-zero / all-0xFF
/// degenerate keys.
pub fn validate_personal_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("personal key must not be empty".into()));
    }
    if key.len() != 32 && key.len() != 64 {
        return Err(Error::InvalidKey(format!(
            "personal key must be 32 or 64 bytes, got {}",
            key.len()
        )));
    }
    if key.iter().all(|&b| b == 0x00) {
        return Err(Error::InvalidKey("personal key is all-zero".into()));
    }
    if key.iter().all(|&b| b == 0xFF) {
        return Err(Error::InvalidKey("personal key is all-0xFF".into()));
    }
    Ok(())
}

/// Encrypt `plaintext` under `key`, a caller-held secret of 32 or 64 bytes.
pub fn encrypt_personal(key: &[u8], plaintext: &[u8]) -> Result<Envelope> {
    encrypt_personal_with(key, plaintext, false)
}

/// Encrypt `plaintext` under `key`, optionally compressing it first.
pub fn encrypt_personal_with(key: &[u8], plaintext: &[u8], compress: bool) -> Result<Envelope> {
    validate_personal_key(key)?;

    let payload: std::borrow::Cow<[u8]> = if compress {
        std::borrow::Cow::Owned(crypto::compress(plaintext))
    } else {
        std::borrow::Cow::Borrowed(plaintext)
    };

    let salt = random_salt();
    let payload_key = crypto::derive_default(key, &salt);
    let iv = aead::random_iv();
    let ciphertext = aead::encrypt(&payload_key, &iv, &payload)?;

    let frame = build_salted_frame(&salt, &iv, &ciphertext);
    let metadata = PersonalMetadata {
        salt: base58::encode(&salt),
        nonce: base58::encode(&iv),
        timestamp: now_unix_secs(),
        version: VERSION_V1.to_string(),
        compressed: if compress { Some(true) } else { None },
    };
    tracing::debug!("personal envelope constructed");
    Ok(Envelope::new(Mode::Personal, &frame, serde_json::to_value(metadata)?))
}

/// Decrypt an envelope produced by [`encrypt_personal`] under `key`.
///
/// Rejects any envelope whose `metadata.salt`, `metadata.nonce` or
/// `metadata.version` disagrees with the parsed frame — see the module
/// docs on why metadata is cross-checked rather than trusted.
pub fn decrypt_personal(key: &[u8], envelope: &Envelope) -> Result<Vec<u8>> {
    validate_personal_key(key)?;
    if envelope.mode()? != Mode::Personal {
        return Err(Error::InvalidEnvelope(format!(
            "expected personal envelope, got {}",
            envelope.method
        )));
    }

    let metadata: PersonalMetadata = serde_json::from_value(envelope.metadata.clone())
        .map_err(|e| Error::InvalidEnvelope(format!("malformed personal metadata: {e}")))?;

    let frame = envelope.frame()?;
    let parsed = parse_salted_frame(&frame)?;

    if metadata.version != VERSION_V1 {
        return Err(Error::TamperDetected(format!(
            "unexpected metadata.version {:?}",
            metadata.version
        )));
    }
    if metadata.salt != base58::encode(parsed.salt) {
        return Err(Error::TamperDetected("metadata.salt does not match frame".into()));
    }
    if metadata.nonce != base58::encode(&parsed.iv) {
        return Err(Error::TamperDetected("metadata.nonce does not match frame".into()));
    }

    let payload_key = crypto::derive_default(key, parsed.salt);
    let plaintext = aead::decrypt(&payload_key, &parsed.iv, parsed.ciphertext_and_tag)?;

    if metadata.compressed.unwrap_or(false) {
        crypto::decompress(&plaintext)
    } else {
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Vec<u8> {
        (1u8..=32u8).collect()
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let k = key();
        let envelope = encrypt_personal(&k, b"diary entry").unwrap();
        let plaintext = decrypt_personal(&k, &envelope).unwrap();
        assert_eq!(plaintext, b"diary entry");
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails_auth() {
        let k = key();
        let other: Vec<u8> = (33u8..=64u8).collect();
        let envelope = encrypt_personal(&k, b"secret").unwrap();
        let err = decrypt_personal(&other, &envelope).unwrap_err();
        assert_eq!(err.kind_tag(), "AuthFailed");
    }

    #[test]
    fn test_rejects_all_zero_key() {
        let err = encrypt_personal(&[0u8; 32], b"x").unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidKey");
    }

    #[test]
    fn test_rejects_empty_key() {
        let err = encrypt_personal(&[], b"x").unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidKey");
    }

    #[test]
    fn test_rejects_wrong_envelope_mode() {
        let k = key();
        let mut envelope = encrypt_personal(&k, b"x").unwrap();
        envelope.method = "direct".to_string();
        let err = decrypt_personal(&k, &envelope).unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidEnvelope");
    }

    #[test]
    fn test_session_wraps_key_validation() {
        let session = PersonalSession::new(&key()).unwrap();
        let envelope = session.encrypt(b"hi").unwrap();
        assert_eq!(session.decrypt(&envelope).unwrap(), b"hi");
    }

    #[test]
    fn test_two_encryptions_use_distinct_frames() {
        let k = key();
        let a = encrypt_personal(&k, b"same plaintext").unwrap();
        let b = encrypt_personal(&k, b"same plaintext").unwrap();
        assert_ne!(a.encrypted_data, b.encrypted_data);
    }

    #[test]
    fn test_compressed_round_trip() {
        let k = key();
        let data = b"repeat repeat repeat repeat repeat".repeat(10);
        let envelope = encrypt_personal_with(&k, &data, true).unwrap();
        assert_eq!(envelope.metadata.get("compressed").and_then(|v| v.as_bool()), Some(true));
        let plaintext = decrypt_personal(&k, &envelope).unwrap();
        assert_eq!(plaintext, data);
    }

    #[test]
    fn test_tampered_metadata_salt_is_detected() {
        let k = key();
        let mut envelope = encrypt_personal(&k, b"x").unwrap();
        envelope.metadata["salt"] = serde_json::json!(base58::encode(&[9u8; 32]));
        let err = decrypt_personal(&k, &envelope).unwrap_err();
        assert_eq!(err.kind_tag(), "TamperDetected");
    }

    #[test]
    fn test_tampered_metadata_nonce_is_detected() {
        let k = key();
        let mut envelope = encrypt_personal(&k, b"x").unwrap();
        envelope.metadata["nonce"] = serde_json::json!(base58::encode(&[9u8; 16]));
        let err = decrypt_personal(&k, &envelope).unwrap_err();
        assert_eq!(err.kind_tag(), "TamperDetected");
    }

    #[test]
    fn test_tampered_metadata_version_is_detected() {
        let k = key();
        let mut envelope = encrypt_personal(&k, b"x").unwrap();
        envelope.metadata["version"] = serde_json::json!("9.9.9");
        let err = decrypt_personal(&k, &envelope).unwrap_err();
        assert_eq!(err.kind_tag(), "TamperDetected");
    }

    #[test]
    fn test_single_bit_flip_in_ciphertext_fails() {
        let k = key();
        let envelope = encrypt_personal(&k, b"flip me").unwrap();
        let mut frame = envelope.frame().unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        let mut tampered = envelope.clone();
        tampered.encrypted_data = base58::encode(&frame);
        let err = decrypt_personal(&k, &tampered).unwrap_err();
        assert!(matches!(err.kind_tag(), "AuthFailed" | "TamperDetected"));
    }
}
