//! # Direct Cipher
//!
//! Pairwise encryption between two identities, keyed solely by the
//! recipient's public key: `shared = kdf(recipientPublicKey, salt, 1_000)`.
//! Notably this does **not** fold in the sender's private key at all, so
//! the construction has a deliberate gap: whoever holds a recipient's
//! public key (public by definition) and can draw a random salt can
//! produce a ciphertext that decrypts cleanly for that recipient, with no
//! proof of who actually sent it. Callers who need to know who sent a
//! message must sign it separately (see [`crate::crypto::sign`]) and
//! verify after decrypting — this crate does not do that for them.
//!
//! [`SecureChannel`] is the other citizen of this module: a genuinely
//! bidirectional channel built on the crate's (also non-standard) key
//! exchange primitive, with a replay-resistant message counter. It does
//! not call [`encrypt_direct`]/[`decrypt_direct`] — those exist for the
//! single-shot, recipient-key-only construction the spec calls
//! "DirectCipher"; `SecureChannel` is a separate, stronger protocol built
//! from the same primitives.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::crypto::{self, aead, base58};
use crate::envelope::{build_salted_frame, parse_salted_frame, Envelope, Mode, VERSION_V1};
use crate::error::{Error, Result};

/// Non-secret metadata carried alongside a Direct envelope's frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMetadata {
    pub sender_public_key: String,
    pub recipient_public_key: String,
    /// Base58 of the salt. Kept under its legacy name: historically this
    /// field held an actual ephemeral Diffie-Hellman public key; here it
    /// is simply the random salt fed into the KDF.
    pub ephemeral_public_key: String,
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

/// Encrypt `plaintext` for `recipient_public_key`. `sender_private_seed`
/// identifies the sender in the envelope's metadata but, per the
/// construction documented on this module, contributes nothing to the
/// derived key.
pub fn encrypt_direct(
    plaintext: &[u8],
    recipient_public_key: &[u8; 32],
    sender_private_seed: &[u8],
) -> Result<Envelope> {
    encrypt_direct_with(plaintext, recipient_public_key, sender_private_seed, false)
}

/// As [`encrypt_direct`], optionally compressing `plaintext` first.
pub fn encrypt_direct_with(
    plaintext: &[u8],
    recipient_public_key: &[u8; 32],
    sender_private_seed: &[u8],
    compress: bool,
) -> Result<Envelope> {
    let sender_public_key = crypto::derive_public_key(sender_private_seed)?;

    let payload: std::borrow::Cow<[u8]> = if compress {
        std::borrow::Cow::Owned(crypto::compress(plaintext))
    } else {
        std::borrow::Cow::Borrowed(plaintext)
    };

    let salt = random_salt();
    let shared = crypto::derive_share(recipient_public_key, &salt);
    let iv = aead::random_iv();
    let ciphertext = aead::encrypt(&shared, &iv, &payload)?;
    let frame = build_salted_frame(&salt, &iv, &ciphertext);

    let metadata = DirectMetadata {
        sender_public_key: base58::encode(&sender_public_key),
        recipient_public_key: base58::encode(recipient_public_key),
        ephemeral_public_key: base58::encode(&salt),
        nonce: base58::encode(&iv),
        timestamp: now_unix_secs(),
        version: VERSION_V1.to_string(),
        compressed: if compress { Some(true) } else { None },
    };
    tracing::debug!("direct envelope constructed");
    Ok(Envelope::new(Mode::Direct, &frame, serde_json::to_value(metadata)?))
}

/// Decrypt an envelope produced by [`encrypt_direct`]. The recipient is
/// identified solely by `recipient_private_seed`; no sender key is needed
/// or checked (see module docs — Direct mode authenticates no sender).
/// A private seed whose derived public key does not match
/// `metadata.recipientPublicKey` is not rejected up front: the derived
/// key simply won't match the one the frame was sealed under, so the
/// AEAD tag check below fails with `AuthFailed`.
pub fn decrypt_direct(envelope: &Envelope, recipient_private_seed: &[u8]) -> Result<Vec<u8>> {
    if envelope.mode()? != Mode::Direct {
        return Err(Error::InvalidEnvelope(format!(
            "expected direct envelope, got {}",
            envelope.method
        )));
    }

    let metadata: DirectMetadata = serde_json::from_value(envelope.metadata.clone())
        .map_err(|e| Error::InvalidEnvelope(format!("malformed direct metadata: {e}")))?;

    let recipient_public_key = crypto::derive_public_key(recipient_private_seed)?;

    let frame = envelope.frame()?;
    let parsed = parse_salted_frame(&frame)?;
    if metadata.ephemeral_public_key != base58::encode(parsed.salt) {
        return Err(Error::TamperDetected("metadata.ephemeralPublicKey does not match frame".into()));
    }
    if metadata.nonce != base58::encode(&parsed.iv) {
        return Err(Error::TamperDetected("metadata.nonce does not match frame".into()));
    }

    let shared = crypto::derive_share(&recipient_public_key, parsed.salt);
    let plaintext = aead::decrypt(&shared, &parsed.iv, parsed.ciphertext_and_tag)?;

    if metadata.compressed.unwrap_or(false) {
        crypto::decompress(&plaintext)
    } else {
        Ok(plaintext)
    }
}

/// A long-lived pairwise channel that binds a strictly-increasing message
/// counter into the AEAD associated data and rejects any decrypt whose
/// counter does not advance past the last one accepted. This stops a
/// captured envelope from being replayed into the channel later, which
/// plain [`decrypt_direct`] cannot detect on its own. Built on
/// [`crate::crypto::derive_shared_secret`] (the key-exchange primitive),
/// not on the recipient-key-only construction above.
pub struct SecureChannel {
    shared_secret: [u8; 32],
    send_counter: u64,
    recv_counter: u64,
}

impl SecureChannel {
    /// Establish a channel from a private seed and the peer's public key.
    pub fn new(my_private_seed: &[u8], their_public_key: &[u8]) -> Result<Self> {
        let shared_secret = crypto::derive_shared_secret(my_private_seed, their_public_key)?;
        Ok(SecureChannel {
            shared_secret,
            send_counter: 0,
            recv_counter: 0,
        })
    }

    /// Establish a channel directly from a precomputed shared secret.
    pub fn from_shared_secret(shared_secret: [u8; 32]) -> Self {
        SecureChannel {
            shared_secret,
            send_counter: 0,
            recv_counter: 0,
        }
    }

    /// The next counter value this channel will send with.
    pub fn send_counter(&self) -> u64 {
        self.send_counter
    }

    /// The last counter value this channel has accepted on decrypt.
    pub fn recv_counter(&self) -> u64 {
        self.recv_counter
    }

    /// Encrypt `plaintext`, advancing the send counter.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Envelope> {
        self.send_counter += 1;
        let counter = self.send_counter;

        let salt = random_salt();
        let payload_key = crypto::derive_default(&self.shared_secret, &salt);
        let iv = aead::random_iv();
        let ciphertext =
            aead::encrypt_with_aad(&payload_key, &iv, plaintext, &counter.to_be_bytes())?;

        let frame = build_salted_frame(&salt, &iv, &ciphertext);
        tracing::debug!(counter, "direct channel message encrypted");
        Ok(Envelope::new(
            Mode::Direct,
            &frame,
            serde_json::json!({ "version": VERSION_V1, "counter": counter }),
        ))
    }

    /// Decrypt an envelope, rejecting it unless its counter strictly
    /// exceeds the last counter this channel accepted.
    pub fn decrypt(&mut self, envelope: &Envelope) -> Result<Vec<u8>> {
        if envelope.mode()? != Mode::Direct {
            return Err(Error::InvalidEnvelope(format!(
                "expected direct envelope, got {}",
                envelope.method
            )));
        }

        let counter = envelope
            .metadata
            .get("counter")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::InvalidEnvelope("missing counter in metadata".into()))?;

        if counter <= self.recv_counter {
            tracing::warn!(counter, last = self.recv_counter, "rejecting replayed direct message");
            return Err(Error::TamperDetected(format!(
                "counter {counter} did not advance past {}",
                self.recv_counter
            )));
        }

        let frame = envelope.frame()?;
        let parsed = parse_salted_frame(&frame)?;
        let payload_key = crypto::derive_default(&self.shared_secret, parsed.salt);
        let plaintext = aead::decrypt_with_aad(
            &payload_key,
            &parsed.iv,
            parsed.ciphertext_and_tag,
            &counter.to_be_bytes(),
        )?;

        self.recv_counter = counter;
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> ([u8; 32], [u8; 32]) {
        use ed25519_dalek::SigningKey;
        let sk = SigningKey::from_bytes(&[seed; 32]);
        (sk.to_bytes(), sk.verifying_key().to_bytes())
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let (alice_priv, _) = keypair(1);
        let (bob_priv, bob_pub) = keypair(2);
        let envelope = encrypt_direct(b"hi bob", &bob_pub, &alice_priv).unwrap();
        assert_eq!(decrypt_direct(&envelope, &bob_priv).unwrap(), b"hi bob");
    }

    #[test]
    fn test_metadata_records_sender_and_recipient() {
        let (alice_priv, alice_pub) = keypair(1);
        let (bob_priv, bob_pub) = keypair(2);
        let envelope = encrypt_direct(b"hi bob", &bob_pub, &alice_priv).unwrap();
        assert_eq!(
            envelope.metadata.get("senderPublicKey").and_then(|v| v.as_str()),
            Some(base58::encode(&alice_pub)).as_deref()
        );
        assert_eq!(
            envelope.metadata.get("recipientPublicKey").and_then(|v| v.as_str()),
            Some(base58::encode(&bob_pub)).as_deref()
        );
        decrypt_direct(&envelope, &bob_priv).unwrap();
    }

    #[test]
    fn test_decrypt_with_wrong_recipient_key_fails() {
        let (alice_priv, _) = keypair(1);
        let (_, bob_pub) = keypair(2);
        let (carol_priv, _) = keypair(3);
        let envelope = encrypt_direct(b"hi bob", &bob_pub, &alice_priv).unwrap();
        let err = decrypt_direct(&envelope, &carol_priv).unwrap_err();
        assert_eq!(err.kind_tag(), "AuthFailed");
    }

    #[test]
    fn test_any_sender_can_encrypt_for_a_recipient() {
        // Documented gap (OQ4): the construction authenticates no sender,
        // so a different private key than the one that "sent" the first
        // message produces an equally valid envelope for the recipient.
        let (alice_priv, _) = keypair(1);
        let (mallory_priv, _) = keypair(99);
        let (bob_priv, bob_pub) = keypair(2);

        let from_alice = encrypt_direct(b"legit", &bob_pub, &alice_priv).unwrap();
        let from_mallory = encrypt_direct(b"spoofed", &bob_pub, &mallory_priv).unwrap();

        assert_eq!(decrypt_direct(&from_alice, &bob_priv).unwrap(), b"legit");
        assert_eq!(decrypt_direct(&from_mallory, &bob_priv).unwrap(), b"spoofed");
    }

    #[test]
    fn test_compressed_round_trip() {
        let (alice_priv, _) = keypair(1);
        let (bob_priv, bob_pub) = keypair(2);
        let data = b"repeat repeat repeat repeat repeat".repeat(10);
        let envelope = encrypt_direct_with(&data, &bob_pub, &alice_priv, true).unwrap();
        let plaintext = decrypt_direct(&envelope, &bob_priv).unwrap();
        assert_eq!(plaintext, data);
    }

    #[test]
    fn test_tampered_ephemeral_public_key_is_detected() {
        let (alice_priv, _) = keypair(1);
        let (bob_priv, bob_pub) = keypair(2);
        let mut envelope = encrypt_direct(b"hi bob", &bob_pub, &alice_priv).unwrap();
        envelope.metadata["ephemeralPublicKey"] = serde_json::json!(base58::encode(&[9u8; 32]));
        let err = decrypt_direct(&envelope, &bob_priv).unwrap_err();
        assert_eq!(err.kind_tag(), "TamperDetected");
    }

    #[test]
    fn test_secure_channel_round_trip_and_counter_advances() {
        let secret = [1u8; 32];
        let mut a = SecureChannel::from_shared_secret(secret);
        let mut b = SecureChannel::from_shared_secret(secret);

        let e1 = a.encrypt(b"first").unwrap();
        assert_eq!(b.decrypt(&e1).unwrap(), b"first");
        let e2 = a.encrypt(b"second").unwrap();
        assert_eq!(b.decrypt(&e2).unwrap(), b"second");
        assert_eq!(b.recv_counter(), 2);
    }

    #[test]
    fn test_secure_channel_rejects_replayed_message() {
        let secret = [1u8; 32];
        let mut a = SecureChannel::from_shared_secret(secret);
        let mut b = SecureChannel::from_shared_secret(secret);

        let e1 = a.encrypt(b"first").unwrap();
        b.decrypt(&e1).unwrap();

        let err = b.decrypt(&e1).unwrap_err();
        assert_eq!(err.kind_tag(), "TamperDetected");
    }

    #[test]
    fn test_secure_channel_rejects_out_of_order_counter() {
        let secret = [1u8; 32];
        let mut a = SecureChannel::from_shared_secret(secret);
        let mut b = SecureChannel::from_shared_secret(secret);

        let e1 = a.encrypt(b"first").unwrap();
        let e2 = a.encrypt(b"second").unwrap();
        b.decrypt(&e2).unwrap();
        let err = b.decrypt(&e1).unwrap_err();
        assert_eq!(err.kind_tag(), "TamperDetected");
    }

    #[test]
    fn test_establish_from_key_exchange_matches_on_both_sides() {
        // Construction chosen so the XOR-based exchange primitive produces
        // the same value from either side: public = private XOR a shared
        // constant known to both parties (see crypto::exchange docs for
        // why this is the only case where the primitive is symmetric).
        let domain_constant = [0x42u8; 32];
        let alice_priv = [1u8; 32];
        let bob_priv = [2u8; 32];
        let mut alice_pub = [0u8; 32];
        let mut bob_pub = [0u8; 32];
        for i in 0..32 {
            alice_pub[i] = alice_priv[i] ^ domain_constant[i];
            bob_pub[i] = bob_priv[i] ^ domain_constant[i];
        }

        let alice_secret = crypto::derive_shared_secret(&alice_priv, &bob_pub).unwrap();
        let bob_secret = crypto::derive_shared_secret(&bob_priv, &alice_pub).unwrap();
        assert_eq!(alice_secret, bob_secret);
    }
}
