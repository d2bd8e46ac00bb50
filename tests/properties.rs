//! One test per testable invariant (P1-P9) from the spec's testable-
//! properties section. These exercise the public API across crate
//! boundaries rather than the per-module unit tests already covering
//! each mode's internals.

use ed25519_dalek::SigningKey;
use serde_json::json;

use keymesh_core::clock::FixedClock;
use keymesh_core::direct;
use keymesh_core::personal;
use keymesh_core::shared_key_store::{SharedKeyStore, SharePermissions};
use keymesh_core::signature_group::{GroupPermissions, Role, SignatureGroup};

fn keypair(seed: u8) -> ([u8; 32], [u8; 32]) {
    let sk = SigningKey::from_bytes(&[seed; 32]);
    (sk.to_bytes(), sk.verifying_key().to_bytes())
}

/// P1: round trip succeeds, and any single-bit flip of encryptedData,
/// metadata.nonce, metadata.salt or metadata.version is detected.
#[test]
fn p1_personal_tamper_detection() {
    let key: Vec<u8> = (1u8..=32u8).collect();
    let envelope = personal::encrypt_personal(&key, b"payload").unwrap();
    assert_eq!(personal::decrypt_personal(&key, &envelope).unwrap(), b"payload");

    let mut bad_salt = envelope.clone();
    bad_salt.metadata["salt"] = json!(keymesh_core::crypto::base58_encode(&[9u8; 32]));
    assert_eq!(personal::decrypt_personal(&key, &bad_salt).unwrap_err().kind_tag(), "TamperDetected");

    let mut bad_nonce = envelope.clone();
    bad_nonce.metadata["nonce"] = json!(keymesh_core::crypto::base58_encode(&[9u8; 16]));
    assert_eq!(personal::decrypt_personal(&key, &bad_nonce).unwrap_err().kind_tag(), "TamperDetected");

    let mut bad_version = envelope.clone();
    bad_version.metadata["version"] = json!("0.0.1");
    assert_eq!(personal::decrypt_personal(&key, &bad_version).unwrap_err().kind_tag(), "TamperDetected");

    let mut bad_ciphertext = envelope;
    let mut frame = bad_ciphertext.frame().unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0x01;
    bad_ciphertext.encrypted_data = keymesh_core::crypto::base58_encode(&frame);
    assert_eq!(personal::decrypt_personal(&key, &bad_ciphertext).unwrap_err().kind_tag(), "AuthFailed");
}

/// P2: decryptPersonal(encryptPersonal(p, k1), k2) fails for k1 != k2.
#[test]
fn p2_personal_wrong_key_fails() {
    let k1: Vec<u8> = (1u8..=32u8).collect();
    let k2: Vec<u8> = (33u8..=64u8).collect();
    let envelope = personal::encrypt_personal(&k1, b"payload").unwrap();
    let err = personal::decrypt_personal(&k2, &envelope).unwrap_err();
    assert_eq!(err.kind_tag(), "AuthFailed");
}

/// P3: DirectCipher round trip for any recipient keypair.
#[test]
fn p3_direct_round_trip() {
    for seed in [1u8, 7, 42, 255] {
        let (sender_priv, _) = keypair(seed.wrapping_add(1));
        let (recipient_priv, recipient_pub) = keypair(seed);
        let envelope = direct::encrypt_direct(b"p", &recipient_pub, &sender_priv).unwrap();
        assert_eq!(direct::decrypt_direct(&envelope, &recipient_priv).unwrap(), b"p");
    }
}

/// P4: every holder with canDecrypt succeeds; non-holders and holders
/// without canDecrypt fail.
#[test]
fn p4_shared_key_round_trip_per_holder() {
    let store = SharedKeyStore::new(FixedClock(1_000));
    let (creator_priv, creator_pub) = keypair(1);
    let (bob_priv, bob_pub) = keypair(2);
    let (eve_priv, eve_pub) = keypair(99);

    let mut no_decrypt = SharePermissions::default();
    no_decrypt.can_encrypt = true;

    let key_id = store
        .create_shared_key(
            creator_pub,
            &[
                (creator_pub, SharePermissions::full()),
                (bob_pub, SharePermissions::full()),
                (eve_pub, no_decrypt),
            ],
            json!({}),
            None,
        )
        .unwrap();

    let envelope = store.encrypt_with_shared_key(&key_id, &creator_priv, &creator_pub, b"shared").unwrap();

    // Every holder with canDecrypt succeeds using their own identity.
    assert_eq!(
        store.decrypt_with_shared_key(&key_id, &bob_priv, &bob_pub, &envelope).unwrap(),
        b"shared"
    );

    // Eve holds a share of the key but it was minted without canDecrypt.
    let err = store.decrypt_with_shared_key(&key_id, &eve_priv, &eve_pub, &envelope).unwrap_err();
    assert_eq!(err.kind_tag(), "PermissionDenied");

    // A non-holder's own freshly created store has no record of this key
    // id at all.
    let outsider_store: SharedKeyStore<FixedClock> = SharedKeyStore::new(FixedClock(1_000));
    let err = outsider_store.decrypt_with_shared_key(&key_id, &bob_priv, &bob_pub, &envelope).unwrap_err();
    assert_eq!(err.kind_tag(), "KeyNotFound");
}

/// P5: after removeRecipientsFromSharedKey(rotateKey=true), a fresh
/// encrypt/decrypt succeeds for remaining holders; the removed holder's
/// old share no longer opens anything encrypted after rotation.
#[test]
fn p5_removal_rotation_revokes_access() {
    let store = SharedKeyStore::new(FixedClock(1_000));
    let (creator_priv, creator_pub) = keypair(1);
    let (bob_priv, bob_pub) = keypair(2);
    let (charlie_priv, charlie_pub) = keypair(3);

    let key_id = store
        .create_shared_key(
            creator_pub,
            &[
                (creator_pub, SharePermissions::full()),
                (bob_pub, SharePermissions::full()),
                (charlie_pub, SharePermissions::full()),
            ],
            json!({}),
            None,
        )
        .unwrap();

    store
        .remove_recipients_from_shared_key(&key_id, &creator_priv, &creator_pub, &[charlie_pub], true)
        .unwrap();

    let envelope = store.encrypt_with_shared_key(&key_id, &creator_priv, &creator_pub, b"after rotation").unwrap();
    assert_eq!(
        store.decrypt_with_shared_key(&key_id, &bob_priv, &bob_pub, &envelope).unwrap(),
        b"after rotation"
    );

    // Charlie no longer holds a valid share: any attempt to sign with his
    // removed key against this key id is rejected outright.
    let err = store.encrypt_with_shared_key(&key_id, &charlie_priv, &charlie_pub, b"x").unwrap_err();
    assert_eq!(err.kind_tag(), "NotMember");
}

/// P6: epoch numbers strictly increase and only the last has no endTime.
#[test]
fn p6_epoch_monotonicity() {
    let (owner_priv, owner_pub) = keypair(1);
    let (_, bob_pub) = keypair(2);
    let (_, carol_pub) = keypair(3);
    let group = SignatureGroup::create(&owner_priv, owner_pub, GroupPermissions::default(), FixedClock(100)).unwrap();
    group.add_member(&owner_priv, &owner_pub, bob_pub, Role::Member).unwrap();
    group.add_member(&owner_priv, &owner_pub, carol_pub, Role::Member).unwrap();
    group.remove_member(&owner_priv, &owner_pub, &bob_pub).unwrap();
    group.rotate_group_keys(&owner_priv, &owner_pub, None).unwrap();

    let epochs = group.epochs();
    assert!(epochs.len() >= 3);
    for pair in epochs.windows(2) {
        assert!(pair[0].epoch_number < pair[1].epoch_number);
        assert!(pair[0].end_time.is_some());
    }
    assert!(epochs.last().unwrap().end_time.is_none());
}

/// P7: the sole Owner can never be removed.
#[test]
fn p7_owner_immortal() {
    let (owner_priv, owner_pub) = keypair(1);
    let group = SignatureGroup::create(&owner_priv, owner_pub, GroupPermissions::default(), FixedClock(100)).unwrap();
    let err = group.remove_member(&owner_priv, &owner_pub, &owner_pub).unwrap_err();
    assert_eq!(err.kind_tag(), "OwnerUndeletable");
}

/// P8: export/import round trip reinstates the same key id, holders and
/// permission set; wrong password fails.
#[test]
fn p8_export_import_identity_and_wrong_password() {
    let store = SharedKeyStore::new(FixedClock(1_000));
    let (_, creator_pub) = keypair(1);
    let (bob_priv, bob_pub) = keypair(2);

    let key_id = store
        .create_shared_key(creator_pub, &[(bob_pub, SharePermissions::full())], json!({}), None)
        .unwrap();

    let package = store.export_shared_key(&key_id, &bob_pub, "correct horse").unwrap();

    let bob_store = SharedKeyStore::new(FixedClock(1_000));
    bob_store.import_shared_key(&package, &bob_priv, &bob_pub, "correct horse").unwrap();

    assert!(bob_store.contains_key(&key_id));
    assert_eq!(store.fingerprint(&key_id).unwrap(), bob_store.fingerprint(&key_id).unwrap());

    let wrong_store = SharedKeyStore::new(FixedClock(1_000));
    let err = wrong_store.import_shared_key(&package, &bob_priv, &bob_pub, "wrong password").unwrap_err();
    assert_eq!(err.kind_tag(), "ImportInvalid");
}

/// P9: any change to the signed metadata document after encryption
/// invalidates decryption in SharedMasterKey and SignatureGroup modes.
#[test]
fn p9_signed_metadata_tamper_invalidates_decryption() {
    let store = SharedKeyStore::new(FixedClock(1_000));
    let (creator_priv, creator_pub) = keypair(1);
    let key_id = store
        .create_shared_key(creator_pub, &[(creator_pub, SharePermissions::full())], json!({}), None)
        .unwrap();
    let envelope = store.encrypt_with_shared_key(&key_id, &creator_priv, &creator_pub, b"x").unwrap();

    let mut bad_key_id = envelope.clone();
    bad_key_id.metadata["keyId"] = json!("not-the-real-key-id");
    let err = store
        .decrypt_with_shared_key(&key_id, &creator_priv, &creator_pub, &bad_key_id)
        .unwrap_err();
    assert_eq!(err.kind_tag(), "TamperDetected");

    // Tampering with the signed recipient list inside metadata breaks the
    // signature over the canonical document even though keyId still matches.
    let mut bad_recipients = envelope;
    bad_recipients.metadata["recipients"] = json!(["not-a-real-recipient"]);
    let err = store
        .decrypt_with_shared_key(&key_id, &creator_priv, &creator_pub, &bad_recipients)
        .unwrap_err();
    assert_eq!(err.kind_tag(), "SignatureInvalid");

    let (owner_priv, owner_pub) = keypair(9);
    let group = SignatureGroup::create(&owner_priv, owner_pub, GroupPermissions::default(), FixedClock(1_000)).unwrap();
    let mut group_envelope = group.encrypt_group(&owner_priv, &owner_pub, b"x").unwrap();
    group_envelope.metadata["epochNumber"] = json!(9999);
    let err = group.decrypt_group(&owner_priv, &owner_pub, &group_envelope).unwrap_err();
    assert_eq!(err.kind_tag(), "EpochClosed");
}
