//! # Shared Key Store
//!
//! A `SharedMasterKey` is one symmetric key shared among a set of holders,
//! each of whom gets their own encrypted copy (an [`EncryptedKeyShare`])
//! rather than the key id alone implying access. A share is encrypted
//! solely under its holder's own public key and a random salt —
//! `shared = kdf(holderPublicKey, salt, 1_000)` — the same
//! public-key-only construction `crate::direct` uses, so no private key
//! of the creator or authorizer is ever needed to mint a share. Adding or
//! removing holders therefore isn't tied to whoever originally created
//! the key: any holder whose own share carries `canShare` may add or
//! remove recipients. Removal defaults to a rotation: a brand new master
//! key is generated and re-shared only to the remaining holders, so a
//! removed holder's copy of the old key is worthless for anything
//! encrypted afterward (forward secrecy on removal — spec invariant P4).
//!
//! Encrypting under a shared key signs a canonical JSON document —
//! `{keyId, sender, timestamp, recipients}` — rather than the raw frame
//! bytes, so tampering with any of those metadata fields (not just the
//! ciphertext) invalidates the signature on decrypt.
//!
//! The store itself is a process-local `keyId -> SharedMasterKey` map
//! guarded by a `parking_lot::RwLock`, mirroring the teacher crate's own
//! `Arc<RwLock<..>>` global-instance pattern.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::clock::Clock;
use crate::crypto::{self, aead, base58};
use crate::envelope::{build_signed_frame, parse_signed_frame, Envelope, Mode};
use crate::error::{Error, Result};

/// What a holder of a key share is allowed to do with it. All capabilities
/// default to `false` — a share grants nothing until explicitly set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharePermissions {
    pub can_decrypt: bool,
    pub can_encrypt: bool,
    pub can_share: bool,
    pub can_revoke: bool,
    /// If set, this share stops being usable after this Unix timestamp.
    pub usage_expires_at: Option<u64>,
}

impl SharePermissions {
    /// A share with every capability granted and no expiry.
    pub fn full() -> Self {
        SharePermissions {
            can_decrypt: true,
            can_encrypt: true,
            can_share: true,
            can_revoke: true,
            usage_expires_at: None,
        }
    }

    fn is_expired(&self, now: u64) -> bool {
        matches!(self.usage_expires_at, Some(exp) if now >= exp)
    }
}

/// A master key encrypted for one specific holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKeyShare {
    #[serde(with = "hex_bytes32")]
    pub holder_public_key: [u8; 32],
    /// `salt(32) | iv(16) | authTag(16) | ciphertext` over the raw master key.
    pub frame: Vec<u8>,
    pub permissions: SharePermissions,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct MasterKeyBytes([u8; 32]);

/// One shared symmetric key and the set of holders who have a copy of it.
pub struct SharedMasterKey {
    pub key_id: String,
    pub metadata: serde_json::Value,
    pub creator_public_key: [u8; 32],
    pub encrypted_shares: Vec<EncryptedKeyShare>,
    pub created_at: u64,
    pub expires_at: Option<u64>,
    master_key: MasterKeyBytes,
}

impl SharedMasterKey {
    /// Public keys of every current holder.
    pub fn holders(&self) -> Vec<[u8; 32]> {
        self.encrypted_shares.iter().map(|s| s.holder_public_key).collect()
    }

    fn share_for(&self, holder_public_key: &[u8; 32]) -> Option<&EncryptedKeyShare> {
        self.encrypted_shares
            .iter()
            .find(|s| &s.holder_public_key == holder_public_key)
    }

    /// An 8-byte fingerprint of the master key so two holders can confirm
    /// out-of-band that they hold the same key, without revealing it.
    pub fn fingerprint(&self) -> String {
        hex::encode(crypto::fingerprint(&self.master_key.0))
    }

    fn require_expiry_ok(&self, now: u64) -> Result<()> {
        if matches!(self.expires_at, Some(exp) if now >= exp) {
            return Err(Error::KeyShareExpired);
        }
        Ok(())
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

/// An exportable snapshot of a `SharedMasterKey` — every holder's
/// encrypted share, but never the raw master key itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedSharedKey {
    pub key_id: String,
    pub metadata: serde_json::Value,
    #[serde(with = "hex_bytes32")]
    pub creator_public_key: [u8; 32],
    pub encrypted_shares: Vec<EncryptedKeyShare>,
    pub created_at: u64,
    pub expires_at: Option<u64>,
}

/// The document encrypted under the backup password: the exportable key
/// material plus who exported it and when.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupInner {
    shared_key: ExportedSharedKey,
    exported_at: u64,
    exported_by: String,
}

/// The outer, password-encrypted envelope a backup string decodes to —
/// not a [`crate::envelope::Envelope`] (no mode/frame split), just the
/// three AEAD fields plus a version tag, per the wire format this export
/// format interoperates with.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupOuter {
    encrypted: String,
    iv: String,
    auth_tag: String,
    version: String,
}

/// Turn a backup password into a 32-byte AES key by UTF-8 encoding it and
/// right-padding (or truncating) to 32 bytes. This is **not** a KDF — no
/// stretching, no salt. A short or predictable password is plaintext-
/// equivalent protection for the backup; see the crate's open design
/// questions on this exact point.
fn password_to_key(password: &str) -> [u8; 32] {
    let mut key = [0u8; 32];
    let bytes = password.as_bytes();
    let n = bytes.len().min(32);
    key[..n].copy_from_slice(&bytes[..n]);
    key
}

/// Encrypt `master_key` for `holder_public_key` per spec §4.4.1:
/// `shared = kdf(holderPublicKey, salt, 1_000)`, the same construction
/// `crate::direct` uses for its single-recipient envelopes. No creator or
/// authorizer private key is involved — anyone who knows a holder's
/// public key can mint them a share.
fn encrypt_share_for(
    holder_public_key: &[u8; 32],
    master_key: &[u8; 32],
    permissions: SharePermissions,
) -> Result<EncryptedKeyShare> {
    let salt = {
        use rand::RngCore;
        let mut s = [0u8; 32];
        rand_core::OsRng.fill_bytes(&mut s);
        s
    };
    let share_key = crypto::derive_share(holder_public_key, &salt);
    let iv = aead::random_iv();
    let ciphertext = aead::encrypt(&share_key, &iv, master_key)?;
    let frame = crate::envelope::build_salted_frame(&salt, &iv, &ciphertext);
    Ok(EncryptedKeyShare {
        holder_public_key: *holder_public_key,
        frame,
        permissions,
    })
}

/// Recover the master key from `share`, proving possession of
/// `holder_private_seed` by checking its derived public key against
/// `share.holder_public_key` before deriving the share key.
fn decrypt_share(share: &EncryptedKeyShare, holder_private_seed: &[u8]) -> Result<[u8; 32]> {
    let derived_public_key = crypto::derive_public_key(holder_private_seed)?;
    if derived_public_key != share.holder_public_key {
        return Err(Error::InvalidKey("private key does not match this share's holder".into()));
    }
    let parsed = crate::envelope::parse_salted_frame(&share.frame)?;
    let share_key = crypto::derive_share(&derived_public_key, parsed.salt);
    let plaintext = aead::decrypt(&share_key, &parsed.iv, parsed.ciphertext_and_tag)?;
    plaintext
        .try_into()
        .map_err(|_| Error::ImportInvalid("decrypted share was not 32 bytes".into()))
}

/// Recover the master key via `holder`'s own share, enforcing that the
/// share exists, has not expired, and carries the capability `required`
/// names.
fn recover_master_key(
    entry: &SharedMasterKey,
    holder_private_seed: &[u8],
    holder_public_key: &[u8; 32],
    now: u64,
    required: impl FnOnce(&SharePermissions) -> bool,
    required_name: &str,
) -> Result<[u8; 32]> {
    let share = entry
        .share_for(holder_public_key)
        .ok_or_else(|| Error::NotMember(hex::encode(holder_public_key)))?;
    if share.permissions.is_expired(now) {
        return Err(Error::KeyShareExpired);
    }
    if !required(&share.permissions) {
        return Err(Error::PermissionDenied(format!("share lacks {required_name}")));
    }
    decrypt_share(share, holder_private_seed)
}

/// The document signed over an `encrypt_with_shared_key` envelope: key id,
/// sender, timestamp and the holder set at signing time, in this fixed
/// field order so encrypt and decrypt always serialize it identically.
#[derive(Serialize)]
struct SignedShareMetadata<'a> {
    key_id: &'a str,
    sender: &'a str,
    timestamp: u64,
    recipients: &'a [String],
}

/// Process-local registry of `SharedMasterKey`s, keyed by key id.
pub struct SharedKeyStore<C: Clock> {
    clock: C,
    keys: RwLock<HashMap<String, SharedMasterKey>>,
}

impl<C: Clock> SharedKeyStore<C> {
    pub fn new(clock: C) -> Self {
        SharedKeyStore { clock, keys: RwLock::new(HashMap::new()) }
    }

    /// Generate a fresh master key and share it with `recipients`.
    /// `creator_public_key` is recorded for bookkeeping (key id
    /// derivation, export provenance) but is only one of the key's
    /// holders if it also appears in `recipients` — callers who want the
    /// creator to retain access must list them explicitly, with whatever
    /// permissions they should hold.
    pub fn create_shared_key(
        &self,
        creator_public_key: [u8; 32],
        recipients: &[([u8; 32], SharePermissions)],
        metadata: serde_json::Value,
        expires_at: Option<u64>,
    ) -> Result<String> {
        let master_key = {
            use rand::RngCore;
            let mut k = [0u8; 32];
            rand_core::OsRng.fill_bytes(&mut k);
            k
        };

        let mut shares = Vec::with_capacity(recipients.len());
        for (holder, perms) in recipients {
            shares.push(encrypt_share_for(holder, &master_key, *perms)?);
        }

        let now = self.clock.now_unix_secs();
        let key_id = crypto::generate_id(&[&creator_public_key, &now.to_be_bytes()]);

        let entry = SharedMasterKey {
            key_id: key_id.clone(),
            metadata,
            creator_public_key,
            encrypted_shares: shares,
            created_at: now,
            expires_at,
            master_key: MasterKeyBytes(master_key),
        };

        tracing::info!(key_id = %key_id, holders = entry.encrypted_shares.len(), "shared key created");
        self.keys.write().insert(key_id.clone(), entry);
        Ok(key_id)
    }

    /// Add new recipients to an existing key, re-sharing the current
    /// master key (no rotation — existing holders keep the same key).
    /// `authorizer` must hold a share with `canShare`; the master key is
    /// recovered through that share rather than trusting the caller.
    pub fn add_recipients_to_shared_key(
        &self,
        key_id: &str,
        authorizer_private_seed: &[u8],
        authorizer_public_key: &[u8; 32],
        new_recipients: &[([u8; 32], SharePermissions)],
    ) -> Result<()> {
        let mut keys = self.keys.write();
        let entry = keys.get_mut(key_id).ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        let now = self.clock.now_unix_secs();

        let master_key = recover_master_key(
            entry,
            authorizer_private_seed,
            authorizer_public_key,
            now,
            |p| p.can_share,
            "canShare",
        )?;

        for (holder, _) in new_recipients {
            if entry.share_for(holder).is_some() {
                return Err(Error::DuplicateMember(hex::encode(holder)));
            }
        }

        for (holder, perms) in new_recipients {
            let share = encrypt_share_for(holder, &master_key, *perms)?;
            entry.encrypted_shares.push(share);
        }
        tracing::info!(key_id, added = new_recipients.len(), "recipients added to shared key");
        Ok(())
    }

    /// Remove `holders_to_remove`. `authorizer` must hold a share with
    /// `canShare`. When `rotate_key` is true, a brand new master key is
    /// generated and re-shared only to the remaining holders, revoking
    /// every removed holder's old share outright; when false the named
    /// shares are simply deleted and the master key is left unchanged.
    pub fn remove_recipients_from_shared_key(
        &self,
        key_id: &str,
        authorizer_private_seed: &[u8],
        authorizer_public_key: &[u8; 32],
        holders_to_remove: &[[u8; 32]],
        rotate_key: bool,
    ) -> Result<()> {
        let mut keys = self.keys.write();
        let entry = keys.get_mut(key_id).ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        let now = self.clock.now_unix_secs();

        recover_master_key(
            entry,
            authorizer_private_seed,
            authorizer_public_key,
            now,
            |p| p.can_share,
            "canShare",
        )?;

        let remaining: Vec<EncryptedKeyShare> = entry
            .encrypted_shares
            .iter()
            .filter(|s| !holders_to_remove.contains(&s.holder_public_key))
            .cloned()
            .collect();

        if remaining.len() == entry.encrypted_shares.len() {
            return Err(Error::NotMember("none of the given holders were present".into()));
        }
        if remaining.is_empty() {
            return Err(Error::NotMember("cannot remove every holder of a shared key".into()));
        }

        if !rotate_key {
            entry.encrypted_shares = remaining;
            tracing::info!(key_id, removed = holders_to_remove.len(), "shared key holders removed without rotation");
            return Ok(());
        }

        let new_master_key = {
            use rand::RngCore;
            let mut k = [0u8; 32];
            rand_core::OsRng.fill_bytes(&mut k);
            k
        };

        let mut new_shares = Vec::with_capacity(remaining.len());
        for old_share in &remaining {
            new_shares.push(encrypt_share_for(&old_share.holder_public_key, &new_master_key, old_share.permissions)?);
        }

        entry.encrypted_shares = new_shares;
        entry.master_key = MasterKeyBytes(new_master_key);
        tracing::info!(key_id, removed = holders_to_remove.len(), "shared key rotated after removal");
        Ok(())
    }

    /// Encrypt `plaintext` under `key_id`'s current master key, recovered
    /// through `signer`'s own share (who must hold `canEncrypt`). Signs the
    /// canonical `{keyId, sender, timestamp, recipients}` document so
    /// tampering with any of those metadata fields is detectable on decrypt,
    /// not just tampering with the ciphertext.
    pub fn encrypt_with_shared_key(
        &self,
        key_id: &str,
        signer_private_key: &[u8],
        signer_public_key: &[u8; 32],
        plaintext: &[u8],
    ) -> Result<Envelope> {
        let keys = self.keys.read();
        let entry = keys.get(key_id).ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        let now = self.clock.now_unix_secs();
        entry.require_expiry_ok(now)?;

        let master_key =
            recover_master_key(entry, signer_private_key, signer_public_key, now, |p| p.can_encrypt, "canEncrypt")?;

        let decoded = crypto::base58_decode(key_id)?;
        if decoded.len() != 32 {
            return Err(Error::InvalidEnvelope(format!(
                "key id does not decode to 32 bytes (got {})",
                decoded.len()
            )));
        }
        let mut key_id_bytes = [0u8; 32];
        key_id_bytes.copy_from_slice(&decoded);

        let recipients: Vec<String> = entry.holders().iter().map(base58::encode).collect();
        let sender = base58::encode(signer_public_key);
        let signed_doc = SignedShareMetadata {
            key_id,
            sender: &sender,
            timestamp: now,
            recipients: &recipients,
        };
        let to_sign = serde_json::to_vec(&signed_doc)?;
        let signature = crypto::sign(signer_private_key, &to_sign)?;

        let iv = aead::random_iv();
        let ciphertext = aead::encrypt(&master_key, &iv, plaintext)?;
        let frame = build_signed_frame(&key_id_bytes, &signature, &iv, &ciphertext);
        Ok(Envelope::new(
            Mode::SharedMasterKey,
            &frame,
            json!({
                "version": crate::envelope::VERSION_V2,
                "keyId": key_id,
                "nonce": base58::encode(&iv),
                "timestamp": now,
                "sender": sender,
                "recipients": recipients,
                "signature": base58::encode(&signature),
            }),
        ))
    }

    /// Decrypt an envelope produced by [`Self::encrypt_with_shared_key`].
    /// `recipient` must hold a share with `canDecrypt`; the master key is
    /// recovered from that share, never from a cached plaintext field.
    pub fn decrypt_with_shared_key(
        &self,
        key_id: &str,
        recipient_private_seed: &[u8],
        recipient_public_key: &[u8; 32],
        envelope: &Envelope,
    ) -> Result<Vec<u8>> {
        if envelope.mode()? != Mode::SharedMasterKey {
            return Err(Error::InvalidEnvelope(format!("expected group envelope, got {}", envelope.method)));
        }
        let keys = self.keys.read();
        let entry = keys.get(key_id).ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        let now = self.clock.now_unix_secs();
        entry.require_expiry_ok(now)?;

        let frame = envelope.frame()?;
        let parsed = parse_signed_frame(&frame)?;

        let metadata_key_id = envelope
            .metadata
            .get("keyId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidEnvelope("missing keyId in metadata".into()))?;
        if metadata_key_id != key_id {
            return Err(Error::TamperDetected("metadata keyId does not match requested key".into()));
        }

        let key_id_bytes = crypto::base58_decode(key_id)?;
        if parsed.id != key_id_bytes.as_slice() {
            return Err(Error::IdMismatch("frame keyId does not match metadata.keyId".into()));
        }

        let metadata_sender = envelope
            .metadata
            .get("sender")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidEnvelope("missing sender in metadata".into()))?;
        let metadata_timestamp = envelope
            .metadata
            .get("timestamp")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::InvalidEnvelope("missing timestamp in metadata".into()))?;
        let metadata_recipients: Vec<String> = envelope
            .metadata
            .get("recipients")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::InvalidEnvelope("missing recipients in metadata".into()))?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or_else(|| Error::InvalidEnvelope("recipients must be an array of strings".into()))?;

        let signed_doc = SignedShareMetadata {
            key_id,
            sender: metadata_sender,
            timestamp: metadata_timestamp,
            recipients: &metadata_recipients,
        };
        let to_verify = serde_json::to_vec(&signed_doc)?;

        let sender_bytes = base58::decode(metadata_sender)?;
        let sender_public_key: [u8; 32] = sender_bytes
            .try_into()
            .map_err(|_| Error::InvalidEnvelope("metadata.sender is not a 32-byte key".into()))?;
        if entry.share_for(&sender_public_key).is_none() {
            return Err(Error::SignatureInvalid("sender is not a known holder of this key".into()));
        }
        crypto::verify(&sender_public_key, &to_verify, parsed.signature)?;

        let master_key =
            recover_master_key(entry, recipient_private_seed, recipient_public_key, now, |p| p.can_decrypt, "canDecrypt")?;
        aead::decrypt(&master_key, &parsed.iv, parsed.ciphertext_and_tag)
    }

    /// Export `key_id`'s current share set as a password-protected backup
    /// string. `exporter_public_key` must hold some share of the key (any
    /// permission suffices — export is not itself a privileged operation).
    ///
    /// Per the design note on [`password_to_key`], the password is *not*
    /// run through a KDF: short or low-entropy passwords should be treated
    /// as plaintext-equivalent protection.
    pub fn export_shared_key(
        &self,
        key_id: &str,
        exporter_public_key: &[u8; 32],
        backup_password: &str,
    ) -> Result<String> {
        let keys = self.keys.read();
        let entry = keys.get(key_id).ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        if entry.share_for(exporter_public_key).is_none() {
            return Err(Error::NotMember(hex::encode(exporter_public_key)));
        }

        let package = ExportedSharedKey {
            key_id: entry.key_id.clone(),
            metadata: entry.metadata.clone(),
            creator_public_key: entry.creator_public_key,
            encrypted_shares: entry.encrypted_shares.clone(),
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        };
        let inner = BackupInner {
            shared_key: package,
            exported_at: self.clock.now_unix_secs(),
            exported_by: base58::encode(exporter_public_key),
        };
        let inner_json = serde_json::to_vec(&inner)?;

        let password_key = password_to_key(backup_password);
        let iv = aead::random_iv();
        let ciphertext_and_tag = aead::encrypt(&password_key, &iv, &inner_json)?;
        let (ciphertext, auth_tag) = aead::split_tag(&ciphertext_and_tag)?;

        let outer = BackupOuter {
            encrypted: base58::encode(ciphertext),
            iv: base58::encode(&iv),
            auth_tag: base58::encode(auth_tag),
            version: crate::envelope::VERSION_V2.to_string(),
        };
        let outer_json = serde_json::to_string(&outer)?;
        tracing::info!(key_id, "shared key exported to password-protected backup");
        Ok(base58::encode(outer_json.as_bytes()))
    }

    /// Import a backup produced by [`Self::export_shared_key`], recovering
    /// the raw master key from `holder_private_seed`'s own share inside
    /// the package. Fails with [`Error::ImportInvalid`] if
    /// `backup_password` is wrong or the package is malformed/corrupted.
    pub fn import_shared_key(
        &self,
        export_package: &str,
        holder_private_seed: &[u8],
        holder_public_key: &[u8; 32],
        backup_password: &str,
    ) -> Result<()> {
        let outer_bytes =
            base58::decode(export_package).map_err(|_| Error::ImportInvalid("export package is not valid base58".into()))?;
        let outer_json = String::from_utf8(outer_bytes)
            .map_err(|_| Error::ImportInvalid("export package was not valid UTF-8".into()))?;
        let outer: BackupOuter = serde_json::from_str(&outer_json)
            .map_err(|e| Error::ImportInvalid(format!("malformed export package: {e}")))?;
        if outer.version != crate::envelope::VERSION_V2 {
            return Err(Error::UnsupportedVersion(outer.version));
        }

        let ciphertext = base58::decode(&outer.encrypted).map_err(|_| Error::ImportInvalid("bad encrypted field".into()))?;
        let auth_tag = base58::decode(&outer.auth_tag).map_err(|_| Error::ImportInvalid("bad authTag field".into()))?;
        let iv_bytes = base58::decode(&outer.iv).map_err(|_| Error::ImportInvalid("bad iv field".into()))?;
        let iv: [u8; aead::IV_SIZE] = iv_bytes
            .try_into()
            .map_err(|_| Error::ImportInvalid("export package iv has the wrong length".into()))?;
        let ciphertext_and_tag = crypto::combine_buffers(&[&ciphertext, &auth_tag]);

        let password_key = password_to_key(backup_password);
        let inner_json = aead::decrypt(&password_key, &iv, &ciphertext_and_tag)
            .map_err(|_| Error::ImportInvalid("wrong backup password or corrupted package".into()))?;
        let inner: BackupInner = serde_json::from_slice(&inner_json)
            .map_err(|e| Error::ImportInvalid(format!("malformed backup contents: {e}")))?;

        let package = inner.shared_key;
        let share = package
            .encrypted_shares
            .iter()
            .find(|s| &s.holder_public_key == holder_public_key)
            .ok_or_else(|| Error::ImportInvalid("no share for this holder in the package".into()))?;

        let master_key = decrypt_share(share, holder_private_seed)?;

        let entry = SharedMasterKey {
            key_id: package.key_id.clone(),
            metadata: package.metadata,
            creator_public_key: package.creator_public_key,
            encrypted_shares: package.encrypted_shares,
            created_at: package.created_at,
            expires_at: package.expires_at,
            master_key: MasterKeyBytes(master_key),
        };

        tracing::info!(key_id = %package.key_id, "shared key imported from backup");
        self.keys.write().insert(package.key_id, entry);
        Ok(())
    }

    /// The fingerprint of a registered key's master key, for out-of-band
    /// comparison between holders.
    pub fn fingerprint(&self, key_id: &str) -> Result<String> {
        let keys = self.keys.read();
        let entry = keys.get(key_id).ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        Ok(entry.fingerprint())
    }

    /// A copy of a registered key's raw master key bytes. Crate-internal:
    /// used by [`crate::signature_group`]'s encrypt path, which composes a
    /// `SharedKeyStore` per group to get per-epoch key history for free.
    pub(crate) fn master_key_bytes(&self, key_id: &str) -> Result<[u8; 32]> {
        let keys = self.keys.read();
        let entry = keys.get(key_id).ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        Ok(entry.master_key.0)
    }

    /// Recover a registered key's master key through `holder`'s own share,
    /// enforcing `canDecrypt`. Crate-internal: used by
    /// [`crate::signature_group`]'s decrypt path so group decryption is
    /// gated the same way [`Self::decrypt_with_shared_key`] is.
    pub(crate) fn decrypt_master_key_for_holder(
        &self,
        key_id: &str,
        holder_private_seed: &[u8],
        holder_public_key: &[u8; 32],
    ) -> Result<[u8; 32]> {
        let keys = self.keys.read();
        let entry = keys.get(key_id).ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        let now = self.clock.now_unix_secs();
        entry.require_expiry_ok(now)?;
        recover_master_key(entry, holder_private_seed, holder_public_key, now, |p| p.can_decrypt, "canDecrypt")
    }

    /// Whether a key id is currently registered.
    pub fn contains_key(&self, key_id: &str) -> bool {
        self.keys.read().contains_key(key_id)
    }
}
