//! # Key Manager (§4.C)
//!
//! High-level operations over the Vault: session-key derivation, wrapped-key
//! creation/unwrap, invite key-set assembly/consumption, and shared-key acquisition.
//! Grounded directly on `services/keyManager.go`.

use uuid::Uuid;

use crate::config::Config;
use crate::crypto::asymmetric::EciesKeyPair;
use crate::crypto::session::{decode_symmetric_key, derive_passphrase_key, derive_session_key, encode_symmetric_key};
use crate::crypto::wrap::{unwrap_private_hex, wrap_private_hex};
use crate::error::{Error, Result};
use crate::model::{Grant, Key, KeyOwner, User};

/// Derive the session symmetric key that roots a user's keyring (§4.C).
pub fn derive_user_session_key(password: &str, encryption_key_salt: &str) -> Vec<u8> {
    derive_session_key(password, encryption_key_salt, Config::global().pbkdf2_iterations)
}

/// Create a new wrapped `Key` row from a freshly generated (or inherited) key pair.
pub fn create_wrapped_key(
    pair: &EciesKeyPair,
    grant: Grant,
    wrapping_key: &[u8],
    salt: String,
    owner: KeyOwner,
    log_id: Option<Uuid>,
) -> Result<Key> {
    let wrapped = wrap_private_hex(&pair.private_key_hex(), wrapping_key)?;
    Ok(Key {
        id: Uuid::new_v4(),
        owner,
        log_id,
        salt,
        public_key_hex: pair.public_key_hex(),
        wrapped_private_hex: hex::encode(wrapped.ciphertext),
        iv: wrapped.iv,
        grant,
    })
}

/// Unwrap a `Key` row's private half using the caller's session symmetric key.
/// Re-derives nothing; the key is used directly as the AES-CBC key (§4.C).
pub fn unwrap_key(key: &Key, session_key: &[u8]) -> Result<EciesKeyPair> {
    let ciphertext = hex::decode(&key.wrapped_private_hex)
        .map_err(|e| Error::Crypto(format!("malformed wrapped key: {e}")))?;
    // Private scalars serialize to 64 hex characters (32 bytes).
    let private_hex = unwrap_private_hex(&ciphertext, 64, &key.iv, session_key)?;
    EciesKeyPair::from_private_hex(&private_hex).map_err(Error::from)
}

/// Assemble the set of keys attached to an invite (§4.C "assemble invite key-set").
///
/// For every key on `inviter` whose grant authority is no greater than `target_grant`,
/// unwrap with the inviter's session key, then re-wrap under a passphrase derived
/// from `(invite_code, fresh_salt)`. Keys with higher authority are silently skipped
/// — a deliberate policy, not a failure (§7).
pub fn assemble_invite_key_set(
    inviter: &User,
    inviter_session_key: &[u8],
    target_grant: Grant,
    invite_code: &str,
) -> Result<Vec<Key>> {
    let mut invite_keys = Vec::new();
    for key in &inviter.keys {
        if !key.grant.authorized_for(target_grant) {
            continue;
        }
        let pair = unwrap_key(key, inviter_session_key)?;
        let salt = crate::crypto::wrap::generate_salt()?;
        let passphrase_key = derive_passphrase_key(invite_code, &salt, Config::global().pbkdf2_iterations);
        let wrapped = create_wrapped_key(
            &pair,
            key.grant,
            &passphrase_key,
            salt,
            KeyOwner::None, // attached to the invite below, not a user
            key.log_id,
        )?;
        invite_keys.push(wrapped);
    }
    Ok(invite_keys)
}

/// Consume an invite's key-set for a newly signing-up user (§4.C "consume invite
/// key-set"). For every invite key, derive the temporary passphrase from
/// `(code, invite_key.salt)`, unwrap, then re-wrap under the new user's session key.
pub fn consume_invite_key_set(
    invite_keys: &[Key],
    code: &str,
    new_user_session_key: &[u8],
    new_user_salt: &str,
) -> Result<Vec<Key>> {
    let mut final_keys = Vec::new();
    for key in invite_keys {
        let passphrase_key = derive_passphrase_key(code, &key.salt, Config::global().pbkdf2_iterations);
        let pair = unwrap_key(key, &passphrase_key)
            .map_err(|_| Error::BadInvite("invalid invite code".into()))?;
        let wrapped = create_wrapped_key(
            &pair,
            key.grant,
            new_user_session_key,
            new_user_salt.to_string(),
            KeyOwner::None, // caller attaches KeyOwner::User(new_user.id) once the id exists
            key.log_id,
        )?;
        final_keys.push(wrapped);
    }
    Ok(final_keys)
}

/// Acquire one free shared-key template on behalf of `user`, re-wrapping it under the
/// user's own session key (§4.C "acquire shared keys on login/signup").
///
/// The template itself is left untouched in storage — it is copied, not moved
/// (§9 open question 4).
pub fn acquire_shared_key(
    user: &User,
    template: &Key,
    user_session_key: &[u8],
) -> Result<Key> {
    let shared_secret = &Config::global().secrets.log_sharing_secret;
    let unwrap_key_material =
        derive_passphrase_key(shared_secret, &template.salt, Config::global().pbkdf2_iterations);
    let pair = unwrap_key(template, &unwrap_key_material)?;

    let mut acquired = create_wrapped_key(
        &pair,
        user.grant,
        user_session_key,
        user.encryption_key_salt.clone(),
        KeyOwner::User(user.id),
        template.log_id,
    )?;
    acquired.grant = Grant::Shared;
    Ok(acquired)
}

/// Uppercase-hex encode a session key for embedding in a token claim (§4.C).
pub fn encode_user_symmetric_key(key: &[u8]) -> String {
    encode_symmetric_key(key)
}

/// Inverse of [`encode_user_symmetric_key`].
pub fn decode_user_symmetric_key(encoded: &str) -> Result<Vec<u8>> {
    decode_symmetric_key(encoded).map_err(|e| Error::AuthError(e.to_string()))
}
