//! # Key Derivation
//!
//! This crate does not use HKDF or PBKDF2. The wire format this crate
//! interoperates with derives keys by re-hashing `secret || salt` through
//! SHA-256 a fixed number of times:
//!
//! ```text
//! h0 = sha256(secret || salt)
//! hN = sha256(h(N-1))          for N in 1..iterations
//! key = h(iterations - 1)
//! ```
//!
//! This is flagged as an open design question upstream (an HMAC-based KDF
//! would be the conventional choice) but is implemented literally here since
//! interoperability with the wire format depends on the exact derivation.

use sha2::{Digest, Sha256};

/// Default iteration count for payload/master key derivation.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Iteration count used when deriving a per-recipient key share.
pub const SHARE_ITERATIONS: u32 = 1_000;

/// Derive a 32-byte key from `secret` and `salt` by iterating SHA-256
/// `iterations` times over `secret || salt`.
///
/// `iterations` must be at least 1.
pub fn derive_key(secret: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    debug_assert!(iterations >= 1, "iterations must be at least 1");

    let mut buf = Vec::with_capacity(secret.len() + salt.len());
    buf.extend_from_slice(secret);
    buf.extend_from_slice(salt);

    let mut digest: [u8; 32] = Sha256::digest(&buf).into();
    for _ in 1..iterations {
        digest = Sha256::digest(digest).into();
    }
    digest
}

/// Derive the default payload/master key (100,000 iterations).
pub fn derive_default(secret: &[u8], salt: &[u8]) -> [u8; 32] {
    derive_key(secret, salt, DEFAULT_ITERATIONS)
}

/// Derive a per-recipient key share key (1,000 iterations).
pub fn derive_share(secret: &[u8], salt: &[u8]) -> [u8; 32] {
    derive_key(secret, salt, SHARE_ITERATIONS)
}

/// Derive a short (8-byte) fingerprint of a key for out-of-band
/// verification, under a fixed domain separation tag so it cannot be
/// confused with a derived payload key.
pub fn fingerprint(key: &[u8]) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(b"keymesh-core:fingerprint:v1");
    hasher.update(key);
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}
