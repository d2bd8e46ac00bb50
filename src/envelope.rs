//! # Envelope
//!
//! The wire format shared by every cipher mode in this crate:
//!
//! ```json
//! { "encryptedData": "<base58>", "method": "<mode>", "metadata": { ... } }
//! ```
//!
//! `encryptedData` base58-decodes to a binary frame whose layout depends on
//! `method`:
//!
//! ```text
//! personal / direct:    salt(32) | iv(16) | authTag(16) | ciphertext
//! group:                keyId(32) | signature(64) | iv(16) | authTag(16) | ciphertext
//! signature-group:      groupId(32) | signature(64) | iv(16) | authTag(16) | ciphertext
//! ```
//!
//! `metadata` carries mode-specific, non-secret context (recipient id,
//! key id, epoch number, compression flag, protocol version, ...) that
//! downstream code can inspect without decrypting the frame, and which
//! this crate cross-checks against the frame's own embedded fields as a
//! tamper check (spec invariant: metadata must agree with the frame).

use serde::{Deserialize, Serialize};

use crate::crypto::{aead, base58, combine_buffers, split_buffer};
use crate::error::{Error, Result};

/// Current wire protocol version. Bumped only on a breaking frame-layout
/// change.
pub const PROTOCOL_VERSION: u32 = 1;

/// Metadata version string carried by Personal and Direct envelopes.
pub const VERSION_V1: &str = "1.0.0";

/// Metadata version string carried by SharedMasterKey and SignatureGroup
/// envelopes (they carry a signature, which v1 envelopes do not).
pub const VERSION_V2: &str = "2.0.0";

/// Which cipher mode produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Self-encryption under a key only the owner holds (C2).
    Personal,
    /// Pairwise encryption between two identities (C3).
    Direct,
    /// Encryption under a `SharedMasterKey` held by a set of recipients (C4).
    SharedMasterKey,
    /// Encryption under a `SignatureGroup`'s current epoch key (C5).
    SignatureGroup,
}

impl Mode {
    /// The `method` string this mode is written as on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Personal => "personal",
            Mode::Direct => "direct",
            Mode::SharedMasterKey => "group",
            Mode::SignatureGroup => "signature-group",
        }
    }

    /// Parse a `method` string back into a [`Mode`].
    pub fn parse(s: &str) -> Result<Mode> {
        match s {
            "personal" => Ok(Mode::Personal),
            "direct" => Ok(Mode::Direct),
            "group" => Ok(Mode::SharedMasterKey),
            "signature-group" => Ok(Mode::SignatureGroup),
            other => Err(Error::UnsupportedVersion(format!(
                "unrecognized envelope method: {other}"
            ))),
        }
    }
}

/// The wire-format envelope common to every cipher mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Base58 encoding of the mode-specific binary frame.
    #[serde(rename = "encryptedData")]
    pub encrypted_data: String,
    /// The cipher mode that produced this envelope.
    pub method: String,
    /// Mode-specific, non-secret metadata.
    pub metadata: serde_json::Value,
}

impl Envelope {
    /// Build an envelope from a raw frame and metadata.
    pub fn new(mode: Mode, frame: &[u8], metadata: serde_json::Value) -> Self {
        tracing::debug!(method = mode.as_str(), frame_len = frame.len(), "constructing envelope");
        Envelope {
            encrypted_data: base58::encode(frame),
            method: mode.as_str().to_string(),
            metadata,
        }
    }

    /// Parse the `method` field into a [`Mode`].
    pub fn mode(&self) -> Result<Mode> {
        Mode::parse(&self.method)
    }

    /// Base58-decode `encryptedData` back into the raw binary frame.
    pub fn frame(&self) -> Result<Vec<u8>> {
        base58::decode(&self.encrypted_data).map_err(|e| {
            tracing::warn!("envelope frame failed to base58-decode");
            e
        })
    }
}

/// `salt(32) | iv(16) | authTag(16) | ciphertext` frame used by Personal
/// and Direct mode.
pub struct SaltedFrame<'a> {
    pub salt: &'a [u8],
    pub iv: [u8; aead::IV_SIZE],
    pub ciphertext_and_tag: &'a [u8],
}

pub fn build_salted_frame(salt: &[u8; 32], iv: &[u8; aead::IV_SIZE], ciphertext_and_tag: &[u8]) -> Vec<u8> {
    combine_buffers(&[salt, iv, ciphertext_and_tag])
}

pub fn parse_salted_frame(frame: &[u8]) -> Result<SaltedFrame<'_>> {
    let parts = split_buffer(frame, &[32, aead::IV_SIZE])?;
    let mut iv = [0u8; aead::IV_SIZE];
    iv.copy_from_slice(parts[1]);
    Ok(SaltedFrame {
        salt: parts[0],
        iv,
        ciphertext_and_tag: parts[2],
    })
}

/// `id(32) | signature(64) | iv(16) | authTag(16) | ciphertext` frame used
/// by SharedMasterKey ("group") and SignatureGroup ("signature-group")
/// mode — the embedded id is a key id in the former, a group id in the
/// latter.
pub struct SignedFrame<'a> {
    pub id: &'a [u8],
    pub signature: &'a [u8],
    pub iv: [u8; aead::IV_SIZE],
    pub ciphertext_and_tag: &'a [u8],
}

pub fn build_signed_frame(
    id: &[u8; 32],
    signature: &[u8; crate::crypto::SIGNATURE_SIZE],
    iv: &[u8; aead::IV_SIZE],
    ciphertext_and_tag: &[u8],
) -> Vec<u8> {
    combine_buffers(&[id, signature, iv, ciphertext_and_tag])
}

pub fn parse_signed_frame(frame: &[u8]) -> Result<SignedFrame<'_>> {
    let parts = split_buffer(frame, &[32, crate::crypto::SIGNATURE_SIZE, aead::IV_SIZE])?;
    let mut iv = [0u8; aead::IV_SIZE];
    iv.copy_from_slice(parts[2]);
    Ok(SignedFrame {
        id: parts[0],
        signature: parts[1],
        iv,
        ciphertext_and_tag: parts[3],
    })
}
