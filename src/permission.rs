//! # Permission Machine (§4.E)
//!
//! State machine over a `PermissionRequest`: Pending → Approved/Denied, and
//! Approved/Denied → (reset) → Pending. Approval mints a fresh Shared-grant key
//! template bound to the log; reset does not revoke it (§9 open question 3 — a
//! documented quirk, not silently "fixed").

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::crypto::asymmetric::EciesKeyPair;
use crate::crypto::session::derive_passphrase_key;
use crate::crypto::wrap::generate_salt;
use crate::error::{Error, Result};
use crate::keyring::create_wrapped_key;
use crate::model::{Grant, Key, KeyOwner, PermissionRequest, PermissionStatus};
use crate::storage::PermissionStore;
use crate::vault::KeyStore;

/// The Permission Machine (§4.E), generic over its storage collaborators.
pub struct PermissionMachine<'a> {
    requests: &'a dyn PermissionStore,
    keys: &'a dyn KeyStore,
}

impl<'a> PermissionMachine<'a> {
    pub fn new(requests: &'a dyn PermissionStore, keys: &'a dyn KeyStore) -> Self {
        Self { requests, keys }
    }

    /// A client requests delegated access to `log_id`. Creates a new `Pending`
    /// request. Fails with `Conflict` if a request already exists for this log
    /// (§3 invariant: at most one request row per `log_id`).
    pub async fn request_permission(&self, log_id: Uuid) -> Result<PermissionRequest> {
        if self.requests.load_by_log_id(log_id).await?.is_some() {
            return Err(Error::Conflict(format!(
                "a permission request for log {log_id} already exists"
            )));
        }
        let request = PermissionRequest::new(log_id, Utc::now());
        self.requests.save(request.clone()).await?;
        Ok(request)
    }

    /// The log's owner approves a pending request: transition to `Approved` and mint
    /// a fresh shared-key template bound to the log (§4.E transition table).
    pub async fn approve_permission(&self, log_id: Uuid) -> Result<(PermissionRequest, Key)> {
        let mut request = self.load_pending(log_id).await?;
        let template = self.mint_shared_key_template(log_id)?;
        self.keys.create(template.clone()).await?;

        request.status = PermissionStatus::Approved;
        request.updated_at = Utc::now();
        self.requests.save(request.clone()).await?;
        log::debug!("permission request for log {log_id} approved, template {}", template.id);

        Ok((request, template))
    }

    /// The log's owner denies a pending request: transition to `Denied`, no key
    /// mint (§4.E transition table).
    pub async fn deny_permission(&self, log_id: Uuid) -> Result<PermissionRequest> {
        let mut request = self.load_pending(log_id).await?;
        request.status = PermissionStatus::Denied;
        request.updated_at = Utc::now();
        self.requests.save(request.clone()).await?;
        Ok(request)
    }

    /// The client resets an Approved or Denied request back to `Pending`.
    ///
    /// Does NOT revoke the shared-key template minted on approval, nor any copies
    /// clients have already acquired from it — this mirrors the source behavior
    /// flagged in §9 as likely unintended; implementers must not silently "fix" it.
    pub async fn reset_permission_request(&self, log_id: Uuid) -> Result<PermissionRequest> {
        let mut request = self
            .requests
            .load_by_log_id(log_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no permission request for log {log_id}")))?;
        if request.status == PermissionStatus::Pending {
            return Err(Error::Conflict("request is already pending".into()));
        }
        request.status = PermissionStatus::Pending;
        request.updated_at = Utc::now();
        self.requests.save(request.clone()).await?;
        Ok(request)
    }

    /// List a user's permission requests paired with whether they've already
    /// acquired the corresponding shared key (§4.E "list permission requests for a
    /// user").
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(PermissionRequest, bool)>> {
        let requests = self.requests.list_for_user(user_id).await?;
        let mut out = Vec::with_capacity(requests.len());
        for request in requests {
            let acquired = self
                .keys
                .load_acquired_shared_for(user_id, request.log_id)
                .await?
                .is_some();
            out.push((request, acquired));
        }
        Ok(out)
    }

    async fn load_pending(&self, log_id: Uuid) -> Result<PermissionRequest> {
        let request = self
            .requests
            .load_by_log_id(log_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no permission request for log {log_id}")))?;
        if request.status != PermissionStatus::Pending {
            return Err(Error::Conflict(format!(
                "permission request for log {log_id} is not pending"
            )));
        }
        Ok(request)
    }

    /// Mint a fresh shared-key template, wrapped under a passphrase derived from the
    /// deployment-wide `log_sharing_secret` and a fresh salt, owned by no one
    /// (§4.E "mint shared-key template").
    fn mint_shared_key_template(&self, log_id: Uuid) -> Result<Key> {
        let salt = generate_salt()?;
        let shared_secret = &Config::global().secrets.log_sharing_secret;
        let wrapping_key =
            derive_passphrase_key(shared_secret, &salt, Config::global().pbkdf2_iterations);

        create_wrapped_key(
            &EciesKeyPair::generate(),
            Grant::Shared,
            &wrapping_key,
            salt,
            KeyOwner::None,
            Some(log_id),
        )
    }
}
