//! # Authenticated Encryption
//!
//! AES-256-GCM, but with a 16-byte IV rather than the usual 12-byte/96-bit
//! nonce the `aes-gcm` crate defaults to. GCM's J0 derivation supports
//! arbitrary IV lengths (GHASH over the IV when it is not exactly 96 bits),
//! so this is still a standard, specified mode of AES-GCM — just not the
//! common case the crate's default type alias covers.

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    aes::Aes256,
    AesGcm,
};
use rand::RngCore;
use rand_core::OsRng;

use crate::error::{Error, Result};

/// Width in bytes of the IV this crate uses (not the crate-default 12).
pub const IV_SIZE: usize = 16;

/// Width in bytes of the GCM authentication tag.
pub const TAG_SIZE: usize = 16;

/// Width in bytes of the AES-256 key.
pub const KEY_SIZE: usize = 32;

type Cipher = AesGcm<Aes256, aes_gcm::aead::consts::U16>;

/// Generate a random 16-byte IV.
pub fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` under `key` with the given 16-byte `iv`, returning
/// `ciphertext || tag` (the `aes-gcm` crate appends the tag to its output).
pub fn encrypt(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Cipher::new(GenericArray::from_slice(key));
    cipher
        .encrypt(GenericArray::from_slice(iv), plaintext)
        .map_err(|e| Error::CryptoSource(format!("aes-gcm encrypt failed: {e}")))
}

/// Decrypt `ciphertext_and_tag` (as produced by [`encrypt`]) under `key`
/// with the given 16-byte `iv`.
///
/// Returns [`Error::AuthFailed`] if the tag does not verify.
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
    ciphertext_and_tag: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Cipher::new(GenericArray::from_slice(key));
    cipher
        .decrypt(GenericArray::from_slice(iv), ciphertext_and_tag)
        .map_err(|_| Error::AuthFailed("AES-GCM tag verification failed".into()))
}

/// Encrypt with associated data that is authenticated but not encrypted
/// (bound into the tag, not present in the output). Used where the frame
/// layout has no room for extra fields but they still need tamper
/// protection — e.g. a replay counter carried in envelope metadata.
pub fn encrypt_with_aad(
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Cipher::new(GenericArray::from_slice(key));
    cipher
        .encrypt(GenericArray::from_slice(iv), Payload { msg: plaintext, aad })
        .map_err(|e| Error::CryptoSource(format!("aes-gcm encrypt failed: {e}")))
}

/// Decrypt with associated data, as produced by [`encrypt_with_aad`].
/// Returns [`Error::AuthFailed`] if the tag does not verify against either
/// the ciphertext or the associated data.
pub fn decrypt_with_aad(
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
    ciphertext_and_tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Cipher::new(GenericArray::from_slice(key));
    cipher
        .decrypt(
            GenericArray::from_slice(iv),
            Payload { msg: ciphertext_and_tag, aad },
        )
        .map_err(|_| Error::AuthFailed("AES-GCM tag verification failed".into()))
}

/// Split a combined `ciphertext || tag` buffer into its two parts. Useful
/// when a caller wants to store/display the tag separately.
pub fn split_tag(ciphertext_and_tag: &[u8]) -> Result<(&[u8], &[u8])> {
    if ciphertext_and_tag.len() < TAG_SIZE {
        return Err(Error::FrameTruncated(
            "ciphertext shorter than the authentication tag".into(),
        ));
    }
    let split_at = ciphertext_and_tag.len() - TAG_SIZE;
    Ok(ciphertext_and_tag.split_at(split_at))
}
