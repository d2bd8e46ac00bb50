//! # Scalable Context
//!
//! A conversation starts cheap — one recipient, a [`SecureChannel`]
//! (`crate::direct`) — and automatically upgrades to a [`SharedKeyStore`]-
//! backed shared key once enough recipients join that per-pair channels
//! stop being the efficient choice. The transition is one-way: once a
//! context has upgraded to `SharedMasterKey` mode it never reverts to
//! `Direct` even if recipients are later removed back down to one, since
//! doing so would mean re-deriving trust from a key whose share history
//! already includes parties who are no longer recipients.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::json;

use crate::clock::Clock;
use crate::crypto;
use crate::direct::SecureChannel;
use crate::envelope::{Envelope, Mode};
use crate::error::{Error, Result};
use crate::shared_key_store::{SharedKeyStore, SharePermissions};

/// Default number of recipients at which a context upgrades from Direct
/// to SharedMasterKey mode.
pub const DEFAULT_AUTO_TRANSITION_THRESHOLD: usize = 2;

/// Which underlying cipher a context currently delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    Direct,
    SharedMasterKey,
}

struct ContextState {
    mode: ContextMode,
    recipients: Vec<[u8; 32]>,
    direct_channels: HashMap<[u8; 32], SecureChannel>,
    shared_key_id: Option<String>,
}

/// An encryption context that scales its underlying cipher mode to its
/// recipient count.
pub struct ScalableContext<C: Clock + Clone> {
    pub context_id: String,
    pub auto_transition_threshold: usize,
    owner_private_seed: Vec<u8>,
    owner_public_key: [u8; 32],
    clock: C,
    state: RwLock<ContextState>,
    key_store: SharedKeyStore<C>,
}

impl<C: Clock + Clone> ScalableContext<C> {
    /// Create a context starting in Direct mode with one recipient.
    pub fn create(
        owner_private_seed: &[u8],
        owner_public_key: [u8; 32],
        initial_recipient: [u8; 32],
        clock: C,
        auto_transition_threshold: Option<usize>,
    ) -> Result<Self> {
        crate::crypto::validate_key_bytes(owner_private_seed)?;
        let now = clock.now_unix_secs();
        let context_id = crypto::generate_id(&[&owner_public_key, &now.to_be_bytes(), b"scalable-context"]);

        let channel = SecureChannel::new(owner_private_seed, &initial_recipient)?;

        let mut channels = HashMap::new();
        channels.insert(initial_recipient, channel);

        tracing::info!(context_id = %context_id, "scalable context created in direct mode");
        Ok(ScalableContext {
            context_id,
            auto_transition_threshold: auto_transition_threshold.unwrap_or(DEFAULT_AUTO_TRANSITION_THRESHOLD),
            owner_private_seed: owner_private_seed.to_vec(),
            owner_public_key,
            clock: clock.clone(),
            state: RwLock::new(ContextState {
                mode: ContextMode::Direct,
                recipients: vec![initial_recipient],
                direct_channels: channels,
                shared_key_id: None,
            }),
            key_store: SharedKeyStore::new(clock),
        })
    }

    /// The context's current mode.
    pub fn mode(&self) -> ContextMode {
        self.state.read().mode
    }

    /// The current recipient set.
    pub fn recipients(&self) -> Vec<[u8; 32]> {
        self.state.read().recipients.clone()
    }

    /// Add recipients, transitioning to SharedMasterKey mode if the new
    /// total crosses `auto_transition_threshold`.
    pub fn add_recipients_to_context(&self, new_recipients: &[[u8; 32]]) -> Result<()> {
        let mut state = self.state.write();

        for r in new_recipients {
            if state.recipients.contains(r) {
                return Err(Error::DuplicateMember(hex::encode(r)));
            }
        }

        match state.mode {
            ContextMode::Direct => {
                state.recipients.extend_from_slice(new_recipients);
                for r in new_recipients {
                    let channel = SecureChannel::new(&self.owner_private_seed, r)?;
                    state.direct_channels.insert(*r, channel);
                }

                if state.recipients.len() >= self.auto_transition_threshold {
                    tracing::info!(
                        context_id = %self.context_id,
                        recipients = state.recipients.len(),
                        "context transitioning from direct to shared-master-key mode"
                    );
                    let mut recipient_shares: Vec<([u8; 32], SharePermissions)> =
                        state.recipients.iter().map(|r| (*r, SharePermissions::full())).collect();
                    recipient_shares.push((self.owner_public_key, SharePermissions::full()));
                    let key_id = self.key_store.create_shared_key(
                        self.owner_public_key,
                        &recipient_shares,
                        json!({ "contextId": self.context_id }),
                        None,
                    )?;
                    state.mode = ContextMode::SharedMasterKey;
                    state.shared_key_id = Some(key_id);
                    state.direct_channels.clear();
                }
            }
            ContextMode::SharedMasterKey => {
                state.recipients.extend_from_slice(new_recipients);
                let key_id = state
                    .shared_key_id
                    .clone()
                    .ok_or_else(|| Error::Internal("shared mode context missing key id".into()))?;
                let recipient_shares: Vec<([u8; 32], SharePermissions)> =
                    new_recipients.iter().map(|r| (*r, SharePermissions::full())).collect();
                self.key_store.add_recipients_to_shared_key(
                    &key_id,
                    &self.owner_private_seed,
                    &self.owner_public_key,
                    &recipient_shares,
                )?;
            }
        }

        Ok(())
    }

    /// Remove recipients. In Direct mode this simply drops the channel.
    /// In SharedMasterKey mode the underlying key is rotated.
    pub fn remove_recipients_from_context(&self, recipients_to_remove: &[[u8; 32]]) -> Result<()> {
        let mut state = self.state.write();

        for r in recipients_to_remove {
            if !state.recipients.contains(r) {
                return Err(Error::NotMember(hex::encode(r)));
            }
        }

        match state.mode {
            ContextMode::Direct => {
                state.recipients.retain(|r| !recipients_to_remove.contains(r));
                for r in recipients_to_remove {
                    state.direct_channels.remove(r);
                }
            }
            ContextMode::SharedMasterKey => {
                let key_id = state
                    .shared_key_id
                    .clone()
                    .ok_or_else(|| Error::Internal("shared mode context missing key id".into()))?;
                state.recipients.retain(|r| !recipients_to_remove.contains(r));
                self.key_store.remove_recipients_from_shared_key(
                    &key_id,
                    &self.owner_private_seed,
                    &self.owner_public_key,
                    recipients_to_remove,
                    true,
                )?;
            }
        }

        Ok(())
    }

    /// Encrypt `plaintext` for every current recipient under whichever
    /// mode the context is currently in.
    pub fn encrypt_in_context(&self, plaintext: &[u8]) -> Result<Envelope> {
        let mut state = self.state.write();
        match state.mode {
            ContextMode::Direct => {
                let recipient = *state
                    .recipients
                    .first()
                    .ok_or_else(|| Error::Internal("direct-mode context has no recipient".into()))?;
                let channel = state
                    .direct_channels
                    .get_mut(&recipient)
                    .ok_or_else(|| Error::Internal("missing direct channel for recipient".into()))?;
                channel.encrypt(plaintext)
            }
            ContextMode::SharedMasterKey => {
                let key_id = state
                    .shared_key_id
                    .clone()
                    .ok_or_else(|| Error::Internal("shared mode context missing key id".into()))?;
                drop(state);
                self.key_store
                    .encrypt_with_shared_key(&key_id, &self.owner_private_seed, &self.owner_public_key, plaintext)
            }
        }
    }

    /// Decrypt an envelope produced by [`Self::encrypt_in_context`].
    pub fn decrypt_in_context(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        match envelope.mode()? {
            Mode::Direct => {
                let mut state = self.state.write();
                let recipient = *state
                    .recipients
                    .first()
                    .ok_or_else(|| Error::Internal("direct-mode context has no recipient".into()))?;
                let channel = state
                    .direct_channels
                    .get_mut(&recipient)
                    .ok_or_else(|| Error::InvalidEnvelope("no direct channel for this envelope".into()))?;
                channel.decrypt(envelope)
            }
            Mode::SharedMasterKey => {
                let key_id = {
                    let state = self.state.read();
                    state
                        .shared_key_id
                        .clone()
                        .ok_or_else(|| Error::Internal("shared mode context missing key id".into()))?
                };
                self.key_store
                    .decrypt_with_shared_key(&key_id, &self.owner_private_seed, &self.owner_public_key, envelope)
            }
            other => Err(Error::InvalidEnvelope(format!("context cannot decrypt {:?} envelopes", other))),
        }
    }
}
