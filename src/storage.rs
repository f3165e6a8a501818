//! # Storage contracts (§6, §10.I)
//!
//! Durable storage is an opaque external collaborator (§1): the core depends only on
//! these `async_trait` contracts, one per aggregate named in §3. No concrete backing
//! engine (SQL, KV) ships in this crate. The Key Vault's own contract, `KeyStore`,
//! lives in `vault.rs` since it is specified alongside the Vault's query semantics.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{ApiKey, Invite, Log, PermissionRequest, User};

/// Storage contract for `User` rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn load_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn load_with_keys(&self, id: Uuid) -> Result<Option<User>>;
    async fn save(&self, user: User) -> Result<()>;
    /// Total user count, used to gate first-user-bootstrap sign-up (§4.D).
    async fn count(&self) -> Result<u64>;
}

/// Storage contract for `Invite` rows.
#[async_trait]
pub trait InviteStore: Send + Sync {
    async fn load_by_id(&self, id: Uuid) -> Result<Option<Invite>>;
    async fn save(&self, invite: Invite) -> Result<()>;
    /// Permanently delete the invite row and every key it owns (§4.D step 4).
    async fn delete_with_keys(&self, id: Uuid) -> Result<()>;
}

/// Storage contract for `Log` rows.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn save(&self, log: Log) -> Result<Log>;
    async fn load_by_id(&self, id: Uuid) -> Result<Option<Log>>;
    /// The client-facing copy whose `ref_log_id` points at the canonical log (§4.F).
    async fn load_by_ref_id(&self, ref_log_id: Uuid) -> Result<Option<Log>>;
}

/// Storage contract for `PermissionRequest` rows.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn load_by_log_id(&self, log_id: Uuid) -> Result<Option<PermissionRequest>>;
    async fn save(&self, request: PermissionRequest) -> Result<()>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PermissionRequest>>;
}

/// Storage contract for `ApiKey` rows.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn save(&self, api_key: ApiKey) -> Result<()>;
    async fn load_by_key(&self, key: &str) -> Result<Option<ApiKey>>;
}
