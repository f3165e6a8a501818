//! The Key Vault's persisted record: one asymmetric key-pair plus wrapping metadata.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::grant::Grant;

/// Who owns a `Key` row. A key may be owned by a user, by a pending invite, or by no
/// one at all (a "free" shared-key template awaiting acquisition).
///
/// The source system represents this with two nullable foreign-key columns
/// (`user_owner_id`, `invite_owner_id`); §9 recommends the cleaner discriminated-pair
/// alternative, adopted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOwner {
    User(Uuid),
    Invite(Uuid),
    /// Ownerless shared-key template, always paired with a `log_id`.
    None,
}

impl KeyOwner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            KeyOwner::User(id) => Some(*id),
            _ => None,
        }
    }

    pub fn invite_id(&self) -> Option<Uuid> {
        match self {
            KeyOwner::Invite(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, KeyOwner::None)
    }
}

/// One asymmetric key-pair record (§3 "Key").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key {
    pub id: Uuid,
    pub owner: KeyOwner,
    /// Set when this key is scoped to a specific log: populated for Shared-grant
    /// templates and for the PartialOwner copies minted for client-accessible logs.
    pub log_id: Option<Uuid>,
    /// Salt used to derive the symmetric key that wraps `wrapped_private`. Immutable
    /// after creation — re-wrapping always creates a new `Key` row (§3 invariant).
    pub salt: String,
    /// Serialized public half (hex-encoded X25519 point).
    pub public_key_hex: String,
    /// AES-CBC ciphertext of the private scalar's hex serialization.
    pub wrapped_private_hex: String,
    /// IV used for `wrapped_private_hex`.
    pub iv: Vec<u8>,
    pub grant: Grant,
}

impl Key {
    /// A key with grant `Shared` and no user owner is "free": any client principal
    /// may atomically claim at most one copy of it (§3 invariant).
    pub fn is_free_shared_template(&self) -> bool {
        self.grant == Grant::Shared && self.owner.is_free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_template_predicate() {
        let key = Key {
            id: Uuid::new_v4(),
            owner: KeyOwner::None,
            log_id: Some(Uuid::new_v4()),
            salt: "s".repeat(32),
            public_key_hex: String::new(),
            wrapped_private_hex: String::new(),
            iv: vec![0; 16],
            grant: Grant::Shared,
        };
        assert!(key.is_free_shared_template());
    }

    #[test]
    fn owned_key_is_not_free() {
        let key = Key {
            id: Uuid::new_v4(),
            owner: KeyOwner::User(Uuid::new_v4()),
            log_id: None,
            salt: "s".repeat(32),
            public_key_hex: String::new(),
            wrapped_private_hex: String::new(),
            iv: vec![0; 16],
            grant: Grant::Client,
        };
        assert!(!key.is_free_shared_template());
    }
}
