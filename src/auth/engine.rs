//! Sign-up, sign-in, invite issuance, API-key issuance (§4.D).
//!
//! The engine is generic over its storage and mailer collaborators (trait objects,
//! §10.I) — it holds no state of its own beyond those handles and the process-wide
//! key material / config it reads through their respective globals.

use std::sync::Arc;

use uuid::Uuid;

use super::keymaterial::KeyMaterial;
use super::token;
use crate::crypto::asymmetric::EciesKeyPair;
use crate::crypto::wrap::{generate_random_string, generate_salt, hash_secret, verify_secret};
use crate::error::{Error, Result};
use crate::keyring;
use crate::mailer::Mailer;
use crate::model::{ApiKey, Grant, Invite, Key, KeyOwner, User};
use crate::storage::{ApiKeyStore, InviteStore, UserStore};
use crate::vault::KeyStore;

const API_KEY_LEN: usize = 32;

/// The Auth Engine (§4.D), generic over its storage/mailer collaborators.
pub struct AuthEngine {
    users: Arc<dyn UserStore>,
    invites: Arc<dyn InviteStore>,
    keys: Arc<dyn KeyStore>,
    api_keys: Arc<dyn ApiKeyStore>,
    mailer: Arc<dyn Mailer>,
}

impl AuthEngine {
    pub fn new(
        users: Arc<dyn UserStore>,
        invites: Arc<dyn InviteStore>,
        keys: Arc<dyn KeyStore>,
        api_keys: Arc<dyn ApiKeyStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            users,
            invites,
            keys,
            api_keys,
            mailer,
        }
    }

    /// Sign up the very first user in the system. Only permitted when the user count
    /// is zero, which this checks itself (§4.D "sign-up first user") rather than
    /// trusting the caller. Mints one Owner-grant and one Client-grant key, both
    /// wrapped under the new user's freshly-derived session key.
    pub async fn sign_up_first_user(&self, email: &str, password: &str) -> Result<(User, String)> {
        if self.users.count().await? != 0 {
            return Err(Error::Conflict("a user already exists".into()));
        }

        let password_salt = generate_salt()?;
        let encryption_key_salt = generate_salt()?;
        let password_hash = hash_secret(password, &password_salt)?;
        let session_key = keyring::derive_user_session_key(password, &encryption_key_salt);

        let user_id = Uuid::new_v4();
        let owner_key = keyring::create_wrapped_key(
            &EciesKeyPair::generate(),
            Grant::Owner,
            &session_key,
            encryption_key_salt.clone(),
            KeyOwner::User(user_id),
            None,
        )?;
        let client_key = keyring::create_wrapped_key(
            &EciesKeyPair::generate(),
            Grant::Client,
            &session_key,
            encryption_key_salt.clone(),
            KeyOwner::User(user_id),
            None,
        )?;

        let user = User {
            id: user_id,
            email: email.to_string(),
            password_hash,
            password_salt,
            encryption_key_salt,
            grant: Grant::Owner,
            keys: vec![owner_key, client_key],
        };

        self.keys.save_all(user.keys.clone()).await?;
        self.users.save(user.clone()).await?;
        log::debug!("first-user bootstrap complete for {email}");

        let token = self.issue_token_for(&user, &session_key)?;
        Ok((user, token))
    }

    /// Sign up a new user by consuming a pending invite (§4.D "sign-up via invite").
    pub async fn sign_up_via_invite(
        &self,
        invite_id: Uuid,
        code: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, String)> {
        let invite = self
            .invites
            .load_by_id(invite_id)
            .await?
            .ok_or_else(|| Error::BadInvite("no such invite".into()))?;

        if !verify_secret(code, &invite.hash_salt, &invite.code_hash)? {
            return Err(Error::BadInvite("invite code does not match".into()));
        }

        let encryption_key_salt = generate_salt()?;
        let session_key = keyring::derive_user_session_key(password, &encryption_key_salt);
        let mut keys = keyring::consume_invite_key_set(
            &invite.keys,
            code,
            &session_key,
            &encryption_key_salt,
        )?;

        let user_id = Uuid::new_v4();
        for key in &mut keys {
            key.owner = KeyOwner::User(user_id);
        }

        self.invites.delete_with_keys(invite_id).await?;

        let password_salt = generate_salt()?;
        let password_hash = hash_secret(password, &password_salt)?;
        let mut user = User {
            id: user_id,
            email: email.to_string(),
            password_hash,
            password_salt,
            encryption_key_salt,
            grant: invite.grant,
            keys,
        };

        self.keys.save_all(user.keys.clone()).await?;

        if user.grant == Grant::Client {
            self.acquire_shared_keys(&mut user, &session_key).await?;
        }

        self.users.save(user.clone()).await?;
        log::debug!("sign-up via invite {invite_id} complete for {email}");

        let token = self.issue_token_for(&user, &session_key)?;
        Ok((user, token))
    }

    /// Sign in with email and password (§4.D "sign-in with email/password").
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(User, String)> {
        let mut user = self
            .users
            .load_by_email(email)
            .await?
            .ok_or(Error::BadCredentials)?;

        if !verify_secret(password, &user.password_salt, &user.password_hash)? {
            return Err(Error::BadCredentials);
        }

        let session_key =
            keyring::derive_user_session_key(password, &user.encryption_key_salt);

        if user.grant == Grant::Client {
            self.acquire_shared_keys(&mut user, &session_key).await?;
        }

        self.users.save(user.clone()).await?;
        log::debug!("sign-in succeeded for {email}");

        let token = self.issue_token_for(&user, &session_key)?;
        Ok((user, token))
    }

    /// Materialize every unacquired shared-key template for `user` (§4.C "acquire
    /// shared keys on login/signup"). Idempotent: re-running attaches no new keys once
    /// every template has been acquired (§8 invariant 5).
    async fn acquire_shared_keys(&self, user: &mut User, session_key: &[u8]) -> Result<()> {
        let templates = self.keys.load_unacquired_shared_for_user(user.id).await?;
        let mut acquired = Vec::with_capacity(templates.len());
        for template in &templates {
            let key = keyring::acquire_shared_key(user, template, session_key)?;
            acquired.push(key.clone());
            user.keys.push(key);
        }
        if !acquired.is_empty() {
            self.keys.save_all(acquired).await?;
        }
        Ok(())
    }

    /// Create an invite for `target_grant`, emitting the code to `recipient_email`
    /// via the Mailer collaborator (§4.D "create invite").
    pub async fn create_invite(
        &self,
        inviter: &User,
        inviter_session_key: &[u8],
        target_grant: Grant,
        recipient_email: &str,
    ) -> Result<Invite> {
        let code = generate_random_string(API_KEY_LEN)?;
        let hash_salt = generate_salt()?;
        let code_hash = hash_secret(&code, &hash_salt)?;

        let invite_keys =
            keyring::assemble_invite_key_set(inviter, inviter_session_key, target_grant, &code)?;

        let invite = Invite {
            id: Uuid::new_v4(),
            keys: invite_keys,
            code_hash,
            hash_salt,
            grant: target_grant,
        };

        self.invites.save(invite.clone()).await?;
        self.mailer
            .send_invite_code(recipient_email, &code)
            .await
            .map_err(|e| Error::Conflict(e.to_string()))?;
        log::debug!("invite {} created for grant {}", invite.id, target_grant.name());

        Ok(invite)
    }

    /// Generate a machine credential bound to `user`'s Client-grant key (§4.D
    /// "generate API key").
    pub async fn generate_api_key(&self, user: &User) -> Result<ApiKey> {
        let client_key: &Key = user
            .key_with_grant(Grant::Client)
            .ok_or_else(|| Error::Forbidden("user has no Client-grant key".into()))?;

        let api_key = ApiKey {
            id: Uuid::new_v4(),
            key: generate_random_string(API_KEY_LEN)?,
            encryption_key_id: client_key.id,
        };
        self.api_keys.save(api_key.clone()).await?;
        Ok(api_key)
    }

    /// Issue an App-principal token announcing `api_key`'s bound public half
    /// (§4.D "token issuance", App variant).
    pub async fn issue_app_token(&self, api_key: &ApiKey) -> Result<String> {
        let key = self
            .keys
            .load_by_id(api_key.encryption_key_id)
            .await?
            .ok_or_else(|| Error::NotFound("encryption key for API key not found".into()))?;
        Ok(token::issue_app_token(
            Grant::App,
            key.public_key_hex,
            KeyMaterial::global(),
        )?)
    }

    fn issue_token_for(&self, user: &User, session_key: &[u8]) -> Result<String> {
        let encoded = keyring::encode_user_symmetric_key(session_key);
        Ok(token::issue_user_token(
            user.id,
            user.grant,
            encoded,
            KeyMaterial::global(),
        )?)
    }
}

/// Authority-grant resolution (§4.D): map a serialized grant name back to a [`Grant`]
/// via the closed lookup. Used by the (out-of-scope) middleware layer after parsing a
/// token's claims.
pub fn resolve_grant(name: &str) -> Result<Grant> {
    Grant::from_name(name).ok_or_else(|| Error::AuthError(format!("unknown grant: {name}")))
}

impl From<token::TokenError> for Error {
    fn from(e: token::TokenError) -> Self {
        Error::AuthError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_grant_accepts_known_names() {
        assert_eq!(resolve_grant("owner").unwrap(), Grant::Owner);
        assert_eq!(resolve_grant("app").unwrap(), Grant::App);
    }

    #[test]
    fn resolve_grant_rejects_unknown_names() {
        assert!(resolve_grant("superuser").is_err());
    }
}
