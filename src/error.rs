//! # Error Handling
//!
//! A single error type for every fallible operation exposed by this crate,
//! grouped into the taxonomy buckets from the spec's error-handling design:
//! input validation, cryptographic, state, authorization, capacity and
//! serialization errors.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR TAXONOMY                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Validation (100-199)                                             │
//! │  │   ├── InvalidKey            - key format/length/content rejected    │
//! │  │   ├── InvalidRecipient      - recipient public key malformed        │
//! │  │   ├── InvalidEnvelope       - envelope missing/mismatched fields    │
//! │  │   └── UnsupportedVersion    - metadata.version not recognized       │
//! │  │                                                                      │
//! │  ├── Cryptographic (300-399)                                           │
//! │  │   ├── AuthFailed            - AEAD tag verification failed          │
//! │  │   ├── SignatureInvalid      - Ed25519 signature verification failed │
//! │  │   ├── TamperDetected        - metadata disagrees with frame         │
//! │  │   └── CryptoSource          - CSPRNG unavailable                    │
//! │  │                                                                      │
//! │  ├── State (400-499)                                                   │
//! │  │   ├── KeyNotFound           - no SharedMasterKey under that id      │
//! │  │   ├── DuplicateMember       - member already present                │
//! │  │   ├── NotMember             - actor holds no share/membership       │
//! │  │   ├── OwnerUndeletable      - attempted to remove the sole Owner    │
//! │  │   ├── EpochClosed           - operation targets a closed epoch      │
//! │  │   └── KeyShareExpired       - share's usageExpiresAt has passed     │
//! │  │                                                                      │
//! │  ├── Authorization (500-599)                                          │
//! │  │   └── PermissionDenied      - missing the required capability      │
//! │  │                                                                      │
//! │  ├── Capacity (600-699)                                               │
//! │  │   ├── GroupFull             - group.permissions.maxMembers reached  │
//! │  │   └── KeyStoreFull          - process-local store bound exceeded    │
//! │  │                                                                      │
//! │  └── Serialization (700-799)                                          │
//! │      ├── ImportInvalid         - export package failed to decode       │
//! │      ├── FrameTruncated        - frame shorter than its fixed widths   │
//! │      └── Base58Invalid         - not valid base58 (bad char/checksum)  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for every operation this crate exposes.
#[derive(Error, Debug)]
pub enum Error {
    // ------------------------------------------------------------------
    // Validation (100-199)
    // ------------------------------------------------------------------
    /// A private or public key was malformed, wrong length, or a rejected
    /// all-zero/all-0xFF value.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A recipient public key failed validation.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    /// An envelope was structurally invalid (wrong mode, missing fields).
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// `metadata.version` is not one this crate understands.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    // ------------------------------------------------------------------
    // Cryptographic (300-399)
    // ------------------------------------------------------------------
    /// AES-GCM authentication tag did not verify.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Ed25519 signature did not verify.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// Metadata fields disagree with the decoded frame (tamper check).
    #[error("tamper detected: {0}")]
    TamperDetected(String),

    /// The OS CSPRNG could not be read.
    #[error("crypto source unavailable: {0}")]
    CryptoSource(String),

    // ------------------------------------------------------------------
    // State (400-499)
    // ------------------------------------------------------------------
    /// No `SharedMasterKey` is registered under the given key id.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The actor is already a member/holder.
    #[error("duplicate member: {0}")]
    DuplicateMember(String),

    /// The actor holds no membership/share for this operation.
    #[error("not a member: {0}")]
    NotMember(String),

    /// Attempted to remove the group's sole Owner.
    #[error("owner cannot be removed")]
    OwnerUndeletable,

    /// The targeted epoch is already closed.
    #[error("epoch closed: {0}")]
    EpochClosed(String),

    /// The holder's key share has expired.
    #[error("key share expired")]
    KeyShareExpired,

    /// The referenced group/context/key id does not match what the caller
    /// supplied (e.g. embedded keyId/groupId in a frame).
    #[error("id mismatch: {0}")]
    IdMismatch(String),

    // ------------------------------------------------------------------
    // Authorization (500-599)
    // ------------------------------------------------------------------
    /// The actor lacks the capability required for this operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    // ------------------------------------------------------------------
    // Capacity (600-699)
    // ------------------------------------------------------------------
    /// The group's `maxMembers` bound has been reached.
    #[error("group full")]
    GroupFull,

    /// The process-local key store has reached its bound.
    #[error("key store full")]
    KeyStoreFull,

    // ------------------------------------------------------------------
    // Serialization (700-799)
    // ------------------------------------------------------------------
    /// An export package failed to decode or decrypt on import.
    #[error("import invalid: {0}")]
    ImportInvalid(String),

    /// A frame was shorter than the fixed widths it is required to contain.
    #[error("frame truncated: {0}")]
    FrameTruncated(String),

    /// A string was not valid base58.
    #[error("invalid base58: {0}")]
    Base58Invalid(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    SerializationError(String),

    // ------------------------------------------------------------------
    // Internal (900-999)
    // ------------------------------------------------------------------
    /// Should not happen in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Numeric code for the error's taxonomy bucket, mirroring the
    /// hundred-ranges documented on the enum.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidKey(_) => 100,
            Error::InvalidRecipient(_) => 101,
            Error::InvalidEnvelope(_) => 102,
            Error::UnsupportedVersion(_) => 103,

            Error::AuthFailed(_) => 300,
            Error::SignatureInvalid(_) => 301,
            Error::TamperDetected(_) => 302,
            Error::CryptoSource(_) => 303,

            Error::KeyNotFound(_) => 400,
            Error::DuplicateMember(_) => 401,
            Error::NotMember(_) => 402,
            Error::OwnerUndeletable => 403,
            Error::EpochClosed(_) => 404,
            Error::KeyShareExpired => 405,
            Error::IdMismatch(_) => 406,

            Error::PermissionDenied(_) => 500,

            Error::GroupFull => 600,
            Error::KeyStoreFull => 601,

            Error::ImportInvalid(_) => 700,
            Error::FrameTruncated(_) => 701,
            Error::Base58Invalid(_) => 702,
            Error::SerializationError(_) => 703,

            Error::Internal(_) => 900,
        }
    }

    /// The taxonomy name from spec §7, stable across crate versions so test
    /// suites can distinguish e.g. `AuthFailed` from `SignatureInvalid` from
    /// `TamperDetected` without string-matching the display message.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Error::InvalidKey(_) => "InvalidKey",
            Error::InvalidRecipient(_) => "InvalidRecipient",
            Error::InvalidEnvelope(_) => "InvalidEnvelope",
            Error::UnsupportedVersion(_) => "UnsupportedVersion",
            Error::AuthFailed(_) => "AuthFailed",
            Error::SignatureInvalid(_) => "SignatureInvalid",
            Error::TamperDetected(_) => "TamperDetected",
            Error::CryptoSource(_) => "CryptoSource",
            Error::KeyNotFound(_) => "KeyNotFound",
            Error::DuplicateMember(_) => "DuplicateMember",
            Error::NotMember(_) => "NotMember",
            Error::OwnerUndeletable => "OwnerUndeletable",
            Error::EpochClosed(_) => "EpochClosed",
            Error::KeyShareExpired => "KeyShareExpired",
            Error::IdMismatch(_) => "IdMismatch",
            Error::PermissionDenied(_) => "PermissionDenied",
            Error::GroupFull => "GroupFull",
            Error::KeyStoreFull => "KeyStoreFull",
            Error::ImportInvalid(_) => "ImportInvalid",
            Error::FrameTruncated(_) => "FrameTruncated",
            Error::Base58Invalid(_) => "Base58Invalid",
            Error::SerializationError(_) => "SerializationError",
            Error::Internal(_) => "Internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
