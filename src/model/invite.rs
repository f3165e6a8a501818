//! Pending onboarding token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::grant::Grant;
use super::key::Key;

/// A pending onboarding token (§3 "Invite").
///
/// Consumed exactly once on successful sign-up, at which point the invite row and all
/// its owned keys are permanently deleted (§4.D sign-up-via-invite step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    /// Invite-owned keys, grant ≤ `grant`.
    pub keys: Vec<Key>,
    /// bcrypt(code || hash_salt).
    pub code_hash: String,
    pub hash_salt: String,
    pub grant: Grant,
}
