//! # keymesh-core
//!
//! A scalable multi-recipient encryption core built from a small set of
//! cipher modes that share one wire format:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        COMPONENT LAYOUT                           │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  crypto             primitives: KDF, AEAD, signing, key exchange,  │
//! │                     base58, framing, compression, id generation   │
//! │  envelope           the wire format shared by every mode below     │
//! │  personal           self-encryption under one held secret          │
//! │  direct             pairwise encryption between two identities     │
//! │  shared_key_store   one key shared among many holders, per-holder  │
//! │                     encrypted shares, add/remove with rotation     │
//! │  signature_group     membership + roles + epoch history on top of  │
//! │                     a shared_key_store composed per group          │
//! │  scalable_context   starts direct, auto-upgrades to shared-key     │
//! │                     once enough recipients are added               │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers choose a mode directly (`personal`, `direct`,
//! `shared_key_store`, `signature_group`) or let [`scalable_context`]
//! pick one as a conversation grows. Every mode produces and consumes the
//! same [`envelope::Envelope`], so a message's `method` field alone tells
//! a reader which decrypt path applies.
//!
//! This crate has no network, storage, CLI or FFI surface: it is a pure
//! encryption core. Callers own persistence, transport and any key
//! distribution side-channel not already covered by `shared_key_store`'s
//! export/import.

pub mod clock;
pub mod crypto;
pub mod direct;
pub mod envelope;
pub mod error;
pub mod personal;
pub mod scalable_context;
pub mod shared_key_store;
pub mod signature_group;

pub use clock::{Clock, SystemClock};
pub use envelope::{Envelope, Mode};
pub use error::{Error, Result};
