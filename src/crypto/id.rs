//! # Identifier Generation
//!
//! `generateId` produces a stable, collision-resistant identifier from an
//! arbitrary number of byte-string inputs: `base58(sha256(concat(inputs)))`.
//! Used for key ids, group ids and share ids throughout this crate.

use sha2::{Digest, Sha256};

use super::base58;

/// Generate an id from the concatenation of `inputs`.
pub fn generate_id(inputs: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input);
    }
    let digest = hasher.finalize();
    base58::encode(&digest)
}

/// Generate a random 32-byte id, base58-encoded. Used where an id needs no
/// derivation from existing material (e.g. a freshly created key id).
pub fn random_id() -> String {
    use rand::RngCore;
    use rand_core::OsRng;

    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    base58::encode(&bytes)
}
