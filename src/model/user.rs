//! Principal record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::grant::Grant;
use super::key::Key;

/// A principal (§3 "User").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// bcrypt(password || password_salt).
    pub password_hash: String,
    pub password_salt: String,
    /// Salt used to derive this user's session symmetric key from their password.
    /// Independent of `password_salt` (§3 invariant).
    pub encryption_key_salt: String,
    pub grant: Grant,
    /// Keys owned by this user. Loading this is a storage-layer join, never a
    /// back-pointer stored on `Key` (§9 "cyclic ownership").
    pub keys: Vec<Key>,
}

impl User {
    /// Keys of a specific grant owned by this user.
    pub fn keys_with_grant(&self, grant: Grant) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(move |k| k.grant == grant)
    }

    /// The single key of a given grant, if exactly one such key is expected
    /// (Owner/Client/App keys are singular per user; Shared keys are not).
    pub fn key_with_grant(&self, grant: Grant) -> Option<&Key> {
        self.keys_with_grant(grant).next()
    }

    /// The acquired Shared-grant key (if any) scoped to a specific log — the key a
    /// Client-grant user unwraps with for delegated retrieval (§4.F).
    pub fn shared_key_for_log(&self, log_id: Uuid) -> Option<&Key> {
        self.keys
            .iter()
            .find(|k| k.grant == Grant::Shared && k.log_id == Some(log_id))
    }
}
