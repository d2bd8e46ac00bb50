//! # Key Exchange
//!
//! This is not Diffie-Hellman. The shared secret is
//! `sha256(private_seed XOR public_key)`. It is symmetric in its two
//! inputs only in the sense that whichever side holds the other's public
//! key and its own private seed derives the same output — there is no
//! discrete-log hardness backing it, and anyone who learns a private seed
//! and the corresponding public key can compute every secret that private
//! seed will ever produce against any public key. This is flagged upstream
//! as a design gap to revisit before this is used as the sole source of
//! message confidentiality; it is implemented as specified.

use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::Result;

/// Derive the pseudo-shared-secret between a private seed and a public key.
///
/// Both inputs must be 32 bytes.
pub fn derive_shared_secret(private_seed: &[u8], public_key: &[u8]) -> Result<[u8; 32]> {
    if private_seed.len() != 32 {
        return Err(Error::InvalidKey(format!(
            "private seed must be 32 bytes, got {}",
            private_seed.len()
        )));
    }
    if public_key.len() != 32 {
        return Err(Error::InvalidRecipient(format!(
            "public key must be 32 bytes, got {}",
            public_key.len()
        )));
    }

    let mut xored = [0u8; 32];
    for i in 0..32 {
        xored[i] = private_seed[i] ^ public_key[i];
    }

    Ok(Sha256::digest(xored).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_shared_secret_is_deterministic() {
        let priv_seed = [1u8; 32];
        let public = [2u8; 32];
        let a = derive_shared_secret(&priv_seed, &public).unwrap();
        let b = derive_shared_secret(&priv_seed, &public).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_shared_secret_differs_by_public_key() {
        let priv_seed = [1u8; 32];
        let a = derive_shared_secret(&priv_seed, &[2u8; 32]).unwrap();
        let b = derive_shared_secret(&priv_seed, &[3u8; 32]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_shared_secret_rejects_wrong_length() {
        let err = derive_shared_secret(&[1u8; 16], &[2u8; 32]).unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidKey");
        let err = derive_shared_secret(&[1u8; 32], &[2u8; 16]).unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidRecipient");
    }
}
