//! # Cryptographic Primitives
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    PRIMITIVE LAYOUT                       │
//! ├──────────────────────────────────────────────────────────┤
//! │  kdf          iterated-SHA256 key derivation               │
//! │  aead         AES-256-GCM, 16-byte IV                      │
//! │  signing      Ed25519 sign/verify                          │
//! │  exchange     XOR + SHA-256 pseudo key exchange             │
//! │  base58       internal base58 codec                        │
//! │  framing      combine/split fixed-width buffers            │
//! │  compression  optional raw-deflate                          │
//! │  id           generateId / random_id                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every other module in this crate builds its envelope handling out of
//! these primitives; none of them know about envelopes, modes or groups.

pub mod aead;
pub mod base58;
pub mod compression;
pub mod exchange;
pub mod framing;
pub mod id;
pub mod kdf;
pub mod signing;

pub use aead::{
    decrypt as aead_decrypt, decrypt_with_aad as aead_decrypt_with_aad, encrypt as aead_encrypt,
    encrypt_with_aad as aead_encrypt_with_aad, random_iv, IV_SIZE, KEY_SIZE, TAG_SIZE,
};
pub use base58::{decode as base58_decode, encode as base58_encode};
pub use compression::{compress, decompress};
pub use exchange::derive_shared_secret;
pub use framing::{combine_buffers, split_buffer};
pub use id::{generate_id, random_id};
pub use kdf::{derive_default, derive_key, derive_share, fingerprint};
pub use signing::{derive_public_key, sign, validate_key_bytes, verify, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
