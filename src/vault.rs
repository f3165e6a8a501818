//! # Key Vault (§4.B)
//!
//! The storage-backed contract for `Key` rows, plus the "unacquired shared key"
//! predicate, which is the only subtle query in this component.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Grant, Key, KeyOwner};

/// Storage contract for `Key` rows (§4.B).
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn create(&self, key: Key) -> Result<Key>;
    async fn load_by_id(&self, id: Uuid) -> Result<Option<Key>>;
    async fn load_by_grant_for_owner(&self, owner: KeyOwner, grant: Grant) -> Result<Option<Key>>;

    /// All free Shared-grant templates not yet acquired by `user_id`, across every
    /// distinct `log_id` (§4.B).
    async fn load_unacquired_shared_for_user(&self, user_id: Uuid) -> Result<Vec<Key>>;

    /// The free Shared-grant template for a specific log, if `user_id` hasn't
    /// acquired a copy yet.
    async fn load_unacquired_shared_for_user_and_log(
        &self,
        user_id: Uuid,
        log_id: Uuid,
    ) -> Result<Option<Key>>;

    /// The Shared-grant key `user_id` has already acquired for `log_id`, if any.
    async fn load_acquired_shared_for(&self, user_id: Uuid, log_id: Uuid) -> Result<Option<Key>>;

    async fn save(&self, key: Key) -> Result<()>;
    async fn save_all(&self, keys: Vec<Key>) -> Result<()>;
    async fn delete_many(&self, ids: &[Uuid]) -> Result<()>;
}

/// Pure predicate underlying the "unacquired shared" query (§4.B), exposed
/// separately from any particular storage backend so it can be unit tested and so
/// in-memory `KeyStore` implementations (for tests) can share the same logic a SQL
/// backend would express as a `WHERE` clause.
///
/// A shared key `candidate` is unacquired by `user_id` iff:
/// 1. `candidate.grant == Shared`,
/// 2. `candidate.owner` is `KeyOwner::None` (a free template),
/// 3. no key in `all_keys_for_log` with the same `log_id` is owned by `user_id`.
pub fn is_unacquired_shared_for_user(
    candidate: &Key,
    user_id: Uuid,
    all_keys_for_log: &[Key],
) -> bool {
    if candidate.grant != Grant::Shared || !candidate.owner.is_free() {
        return false;
    }
    !all_keys_for_log
        .iter()
        .any(|k| k.log_id == candidate.log_id && k.owner.user_id() == Some(user_id))
}
