//! # Signature Group
//!
//! A membership group where encryption/decryption is backed by a sequence
//! of epochs, each epoch being one [`SharedMasterKey`](crate::shared_key_store::SharedMasterKey)
//! held internally. Rotating the group (explicitly, or implicitly on
//! member removal) closes the current epoch and opens a new one under a
//! freshly generated key shared only with the members entitled to it —
//! old epochs and their keys are kept, so history encrypted before a
//! rotation stays readable to whoever held a share of that epoch's key,
//! while a removed member never receives a share of anything rotated
//! after their removal (spec invariant P4).
//!
//! Composing a private [`SharedKeyStore`] this way means every epoch's
//! key gets the same rotation/export machinery C4 already provides,
//! rather than a second, parallel implementation of key distribution.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::clock::Clock;
use crate::crypto::{self, aead};
use crate::envelope::{build_signed_frame, parse_signed_frame, Envelope, Mode};
use crate::error::{Error, Result};
use crate::shared_key_store::{SharedKeyStore, SharePermissions};

/// A member's standing within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

/// The capabilities a member has within the group.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberPermissions {
    pub can_decrypt: bool,
    pub can_encrypt: bool,
    pub can_add: bool,
    pub can_remove: bool,
    pub can_rotate: bool,
}

impl Role {
    /// The default capability set for a role. A pure lookup table, no
    /// per-member overrides — roles are the only source of permissions.
    pub fn default_permissions(&self) -> MemberPermissions {
        match self {
            Role::Owner => MemberPermissions {
                can_decrypt: true,
                can_encrypt: true,
                can_add: true,
                can_remove: true,
                can_rotate: true,
            },
            Role::Admin => MemberPermissions {
                can_decrypt: true,
                can_encrypt: true,
                can_add: true,
                can_remove: true,
                can_rotate: false,
            },
            Role::Member => MemberPermissions {
                can_decrypt: true,
                can_encrypt: true,
                can_add: false,
                can_remove: false,
                can_rotate: false,
            },
            Role::Viewer => MemberPermissions {
                can_decrypt: true,
                can_encrypt: false,
                can_add: false,
                can_remove: false,
                can_rotate: false,
            },
        }
    }
}

mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// One member of a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    #[serde(with = "hex_bytes32")]
    pub public_key: [u8; 32],
    pub role: Role,
    pub joined_at: u64,
    #[serde(with = "hex_bytes32")]
    pub added_by: [u8; 32],
    pub permissions: MemberPermissions,
}

/// Group-wide limits, independent of any one member's permissions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GroupPermissions {
    pub max_members: Option<usize>,
}

/// One epoch of the group's key history. Only the last epoch in a group
/// is open (`end_time: None`) — every prior one is closed at the moment
/// the next epoch began.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epoch {
    pub epoch_number: u64,
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub master_key_id: String,
    pub rotation_reason: Option<String>,
}

struct GroupState {
    members: Vec<GroupMember>,
    epochs: Vec<Epoch>,
}

/// A membership group whose encryption key rotates on explicit request or
/// on member removal.
pub struct SignatureGroup<C: Clock + Clone> {
    pub group_id: String,
    pub permissions: GroupPermissions,
    clock: C,
    state: RwLock<GroupState>,
    key_store: SharedKeyStore<C>,
}

/// Map a group role's permissions onto the share permissions its member
/// gets on the epoch's underlying `SharedMasterKey`: whoever can add or
/// remove group members must also be able to authorize the matching
/// `SharedKeyStore` operation (`canShare`), since the spec gates both on
/// the same capability.
fn share_permissions_for(role: Role) -> SharePermissions {
    let perms = role.default_permissions();
    SharePermissions {
        can_decrypt: perms.can_decrypt,
        can_encrypt: perms.can_encrypt,
        can_share: perms.can_add || perms.can_remove,
        can_revoke: perms.can_remove,
        usage_expires_at: None,
    }
}

impl<C: Clock + Clone> SignatureGroup<C> {
    /// Create a group with a single Owner member and an opening epoch.
    pub fn create(
        owner_private_seed: &[u8],
        owner_public_key: [u8; 32],
        permissions: GroupPermissions,
        clock: C,
    ) -> Result<Self> {
        let now = clock.now_unix_secs();
        let group_id = crypto::generate_id(&[&owner_public_key, &now.to_be_bytes(), b"signature-group"]);

        crypto::validate_key_bytes(owner_private_seed)?;
        let key_store = SharedKeyStore::new(clock.clone());
        let key_id = key_store.create_shared_key(
            owner_public_key,
            &[(owner_public_key, share_permissions_for(Role::Owner))],
            json!({}),
            None,
        )?;

        let owner = GroupMember {
            public_key: owner_public_key,
            role: Role::Owner,
            joined_at: now,
            added_by: owner_public_key,
            permissions: Role::Owner.default_permissions(),
        };
        let epoch0 = Epoch {
            epoch_number: 0,
            start_time: now,
            end_time: None,
            master_key_id: key_id,
            rotation_reason: None,
        };

        tracing::info!(group_id = %group_id, "signature group created");
        Ok(SignatureGroup {
            group_id,
            permissions,
            clock,
            state: RwLock::new(GroupState { members: vec![owner], epochs: vec![epoch0] }),
            key_store,
        })
    }

    fn find_member(state: &GroupState, public_key: &[u8; 32]) -> Option<GroupMember> {
        state.members.iter().find(|m| &m.public_key == public_key).cloned()
    }

    /// The currently open epoch (always the last one).
    pub fn current_epoch(&self) -> Epoch {
        let state = self.state.read();
        state.epochs.last().expect("a group always has at least one epoch").clone()
    }

    /// The epoch that was open at Unix time `ts`, if any.
    pub fn epoch_at(&self, ts: u64) -> Option<Epoch> {
        let state = self.state.read();
        state
            .epochs
            .iter()
            .find(|e| e.start_time <= ts && e.end_time.map_or(true, |end| ts < end))
            .cloned()
    }

    /// A snapshot of current members.
    pub fn members(&self) -> Vec<GroupMember> {
        self.state.read().members.clone()
    }

    /// A snapshot of the epoch history.
    pub fn epochs(&self) -> Vec<Epoch> {
        self.state.read().epochs.clone()
    }

    /// Add `new_member` with `role`, actioned by `actor` who must hold
    /// `can_add`.
    pub fn add_member(
        &self,
        actor_private_seed: &[u8],
        actor_public_key: &[u8; 32],
        new_member_public_key: [u8; 32],
        role: Role,
    ) -> Result<()> {
        let now = self.clock.now_unix_secs();
        let mut state = self.state.write();

        let actor = Self::find_member(&state, actor_public_key)
            .ok_or_else(|| Error::NotMember(hex::encode(actor_public_key)))?;
        if !actor.permissions.can_add {
            return Err(Error::PermissionDenied("actor lacks canAdd".into()));
        }
        if state.members.iter().any(|m| m.public_key == new_member_public_key) {
            return Err(Error::DuplicateMember(hex::encode(new_member_public_key)));
        }
        if let Some(max) = self.permissions.max_members {
            if state.members.len() >= max {
                return Err(Error::GroupFull);
            }
        }

        let current_key_id = state.epochs.last().unwrap().master_key_id.clone();
        self.key_store.add_recipients_to_shared_key(
            &current_key_id,
            actor_private_seed,
            actor_public_key,
            &[(new_member_public_key, share_permissions_for(role))],
        )?;

        state.members.push(GroupMember {
            public_key: new_member_public_key,
            role,
            joined_at: now,
            added_by: *actor_public_key,
            permissions: role.default_permissions(),
        });
        tracing::info!(group_id = %self.group_id, "member added");
        Ok(())
    }

    /// Remove `target` from the group, actioned by `actor` who must hold
    /// `can_remove`. The Owner can never be removed. Rotates the group's
    /// key to a new epoch shared only with the remaining members.
    pub fn remove_member(
        &self,
        actor_private_seed: &[u8],
        actor_public_key: &[u8; 32],
        target_public_key: &[u8; 32],
    ) -> Result<()> {
        let now = self.clock.now_unix_secs();
        let mut state = self.state.write();

        let actor = Self::find_member(&state, actor_public_key)
            .ok_or_else(|| Error::NotMember(hex::encode(actor_public_key)))?;
        if !actor.permissions.can_remove {
            return Err(Error::PermissionDenied("actor lacks canRemove".into()));
        }
        crypto::validate_key_bytes(actor_private_seed)?;

        let target = Self::find_member(&state, target_public_key)
            .ok_or_else(|| Error::NotMember(hex::encode(target_public_key)))?;
        if target.role == Role::Owner {
            return Err(Error::OwnerUndeletable);
        }

        state.members.retain(|m| &m.public_key != target_public_key);

        self.rotate_locked(&mut state, actor_public_key, now, Some("member_removed".to_string()))?;
        tracing::info!(group_id = %self.group_id, "member removed, group rotated");
        Ok(())
    }

    /// Explicitly rotate the group's key without removing anyone, actioned
    /// by `actor` who must hold `can_rotate`.
    pub fn rotate_group_keys(
        &self,
        actor_private_seed: &[u8],
        actor_public_key: &[u8; 32],
        reason: Option<String>,
    ) -> Result<()> {
        let now = self.clock.now_unix_secs();
        let mut state = self.state.write();

        let actor = Self::find_member(&state, actor_public_key)
            .ok_or_else(|| Error::NotMember(hex::encode(actor_public_key)))?;
        if !actor.permissions.can_rotate {
            return Err(Error::PermissionDenied("actor lacks canRotate".into()));
        }
        crypto::validate_key_bytes(actor_private_seed)?;

        self.rotate_locked(&mut state, actor_public_key, now, reason)?;
        tracing::info!(group_id = %self.group_id, "group keys rotated");
        Ok(())
    }

    fn rotate_locked(
        &self,
        state: &mut GroupState,
        actor_public_key: &[u8; 32],
        now: u64,
        reason: Option<String>,
    ) -> Result<()> {
        let recipients: Vec<([u8; 32], SharePermissions)> =
            state.members.iter().map(|m| (m.public_key, share_permissions_for(m.role))).collect();

        let new_key_id = self.key_store.create_shared_key(*actor_public_key, &recipients, json!({}), None)?;

        let last_epoch_number = state.epochs.last().unwrap().epoch_number;
        if let Some(last) = state.epochs.last_mut() {
            last.end_time = Some(now);
        }
        state.epochs.push(Epoch {
            epoch_number: last_epoch_number + 1,
            start_time: now,
            end_time: None,
            master_key_id: new_key_id,
            rotation_reason: reason,
        });
        Ok(())
    }

    /// Encrypt `plaintext` under the current epoch's key, signed by
    /// `signer` who must be a member with `can_encrypt`.
    pub fn encrypt_group(
        &self,
        signer_private_key: &[u8],
        signer_public_key: &[u8; 32],
        plaintext: &[u8],
    ) -> Result<Envelope> {
        let state = self.state.read();
        let signer = Self::find_member(&state, signer_public_key)
            .ok_or_else(|| Error::NotMember(hex::encode(signer_public_key)))?;
        if !signer.permissions.can_encrypt {
            return Err(Error::PermissionDenied("member lacks canEncrypt".into()));
        }

        let epoch = state.epochs.last().unwrap();
        let master_key = self.key_store.master_key_bytes(&epoch.master_key_id)?;

        let group_id_bytes = crypto::base58_decode(&self.group_id)?;
        if group_id_bytes.len() != 32 {
            return Err(Error::Internal("group id did not decode to 32 bytes".into()));
        }
        let mut group_id_arr = [0u8; 32];
        group_id_arr.copy_from_slice(&group_id_bytes);

        let iv = aead::random_iv();
        let ciphertext = aead::encrypt(&master_key, &iv, plaintext)?;
        let to_sign = crypto::combine_buffers(&[&group_id_arr, &iv, &ciphertext]);
        let signature = crypto::sign(signer_private_key, &to_sign)?;

        let frame = build_signed_frame(&group_id_arr, &signature, &iv, &ciphertext);
        Ok(Envelope::new(
            Mode::SignatureGroup,
            &frame,
            json!({
                "version": crate::envelope::VERSION_V2,
                "groupId": self.group_id,
                "epochNumber": epoch.epoch_number,
            }),
        ))
    }

    /// Decrypt an envelope produced by [`Self::encrypt_group`]. `recipient`
    /// must currently be a member with `can_decrypt`; the epoch's master
    /// key is recovered through their own share of that epoch's
    /// `SharedMasterKey` rather than a cached plaintext field.
    pub fn decrypt_group(
        &self,
        recipient_private_seed: &[u8],
        recipient_public_key: &[u8; 32],
        envelope: &Envelope,
    ) -> Result<Vec<u8>> {
        if envelope.mode()? != Mode::SignatureGroup {
            return Err(Error::InvalidEnvelope(format!(
                "expected signature-group envelope, got {}",
                envelope.method
            )));
        }

        let metadata_group_id = envelope
            .metadata
            .get("groupId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidEnvelope("missing groupId in metadata".into()))?;
        if metadata_group_id != self.group_id {
            return Err(Error::TamperDetected("metadata groupId does not match this group".into()));
        }
        let epoch_number = envelope
            .metadata
            .get("epochNumber")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::InvalidEnvelope("missing epochNumber in metadata".into()))?;

        let frame = envelope.frame()?;
        let parsed = parse_signed_frame(&frame)?;

        let group_id_bytes = crypto::base58_decode(&self.group_id)?;
        if parsed.id != group_id_bytes.as_slice() {
            return Err(Error::TamperDetected("frame groupId does not match envelope metadata".into()));
        }

        let state = self.state.read();
        let epoch = state
            .epochs
            .iter()
            .find(|e| e.epoch_number == epoch_number)
            .ok_or_else(|| Error::EpochClosed(format!("no epoch numbered {epoch_number}")))?;

        let to_verify = crypto::combine_buffers(&[parsed.id, &parsed.iv, parsed.ciphertext_and_tag]);
        let verified = state
            .members
            .iter()
            .any(|m| crypto::verify(&m.public_key, &to_verify, parsed.signature).is_ok());
        if !verified {
            return Err(Error::SignatureInvalid("no current member's signature verified".into()));
        }

        let recipient = Self::find_member(&state, recipient_public_key)
            .ok_or_else(|| Error::NotMember(hex::encode(recipient_public_key)))?;
        if !recipient.permissions.can_decrypt {
            return Err(Error::PermissionDenied("member lacks canDecrypt".into()));
        }

        let master_key =
            self.key_store.decrypt_master_key_for_holder(&epoch.master_key_id, recipient_private_seed, recipient_public_key)?;
        aead::decrypt(&master_key, &parsed.iv, parsed.ciphertext_and_tag)
    }
}
