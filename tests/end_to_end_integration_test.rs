//! End-to-end integration tests covering the canonical scenarios (spec §8, S1-S6):
//! first-user bootstrap, invite issuance and consumption, log ingestion and owner
//! retrieval, delegated access through the permission machine, and the
//! wrong-invite-code failure path.
//!
//! All storage and mail-delivery collaborators are in-memory stand-ins implementing
//! this crate's trait contracts — the same pattern the unit tests in
//! `src/permission.rs` and `src/vault.rs` use for their own fixtures.

use std::collections::HashMap;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use p521::ecdsa::{SigningKey, VerifyingKey};
use p521::pkcs8::{EncodePrivateKey as _, EncodePublicKey as _, LineEnding as EcLineEnding};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey as _, EncodePublicKey as _, LineEnding as RsaLineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use uuid::Uuid;

use sharelog_core::auth::engine::AuthEngine;
use sharelog_core::config::Config;
use sharelog_core::crypto::asymmetric::EciesKeyPair;
use sharelog_core::logcrypt::LogCryptor;
use sharelog_core::mailer::{Mailer, MailerError};
use sharelog_core::model::{ApiKey, Grant, Invite, Key, KeyOwner, Log, PermissionRequest, User};
use sharelog_core::permission::PermissionMachine;
use sharelog_core::storage::{ApiKeyStore, InviteStore, LogStore, PermissionStore, UserStore};
use sharelog_core::vault::KeyStore;
use sharelog_core::Result;

static INIT: Once = Once::new();

/// Install the process-wide `Config` and JWE/JWS key material exactly once per test
/// binary, generating throwaway RSA/P-521 keys and writing them to temp PEM files
/// (§6 "on-disk key material").
fn init_globals_once() {
    INIT.call_once(|| {
        let dir = std::env::temp_dir().join(format!("sharelog-core-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut rng = OsRng;
        let jwe_priv = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let jwe_pub = RsaPublicKey::from(&jwe_priv);
        let jws_priv = SigningKey::random(&mut rng);
        let jws_pub = VerifyingKey::from(&jws_priv);

        let jwe_priv_path = dir.join("jwe_priv.pem");
        let jwe_pub_path = dir.join("jwe_pub.pem");
        let jws_priv_path = dir.join("jws_priv.pem");
        let jws_pub_path = dir.join("jws_pub.pem");

        jwe_priv
            .write_pkcs8_pem_file(&jwe_priv_path, RsaLineEnding::LF)
            .unwrap();
        jwe_pub
            .write_public_key_pem_file(&jwe_pub_path, RsaLineEnding::LF)
            .unwrap();
        jws_priv
            .write_pkcs8_pem_file(&jws_priv_path, EcLineEnding::LF)
            .unwrap();
        jws_pub
            .write_public_key_pem_file(&jws_pub_path, EcLineEnding::LF)
            .unwrap();

        std::env::set_var("JWE_PUB_KEY_PATH", &jwe_pub_path);
        std::env::set_var("JWE_PK_PATH", &jwe_priv_path);
        std::env::set_var("JWT_PUB_KEY_PATH", &jws_pub_path);
        std::env::set_var("JWT_PK_PATH", &jws_priv_path);
        std::env::set_var("LOG_SHARING_SECRET", "end-to-end-test-sharing-secret");
        std::env::set_var("PBKDF2_ITERATIONS", "1000");

        let config = Config::init_global().expect("config init");
        sharelog_core::auth::KeyMaterial::init_global(&config.key_paths)
            .expect("key material init");
    });
}

// ---------------------------------------------------------------------------
// In-memory storage collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InMemoryUsers(Mutex<HashMap<Uuid, User>>);

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn load_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.0.lock().values().find(|u| u.email == email).cloned())
    }
    async fn load_with_keys(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.0.lock().get(&id).cloned())
    }
    async fn save(&self, user: User) -> Result<()> {
        self.0.lock().insert(user.id, user);
        Ok(())
    }
    async fn count(&self) -> Result<u64> {
        Ok(self.0.lock().len() as u64)
    }
}

#[derive(Default)]
struct InMemoryInvites(Mutex<HashMap<Uuid, Invite>>);

#[async_trait]
impl InviteStore for InMemoryInvites {
    async fn load_by_id(&self, id: Uuid) -> Result<Option<Invite>> {
        Ok(self.0.lock().get(&id).cloned())
    }
    async fn save(&self, invite: Invite) -> Result<()> {
        self.0.lock().insert(invite.id, invite);
        Ok(())
    }
    async fn delete_with_keys(&self, id: Uuid) -> Result<()> {
        self.0.lock().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryLogs(Mutex<Vec<Log>>);

#[async_trait]
impl LogStore for InMemoryLogs {
    async fn save(&self, log: Log) -> Result<Log> {
        self.0.lock().push(log.clone());
        Ok(log)
    }
    async fn load_by_id(&self, id: Uuid) -> Result<Option<Log>> {
        Ok(self.0.lock().iter().find(|l| l.id == id).cloned())
    }
    async fn load_by_ref_id(&self, ref_log_id: Uuid) -> Result<Option<Log>> {
        Ok(self
            .0
            .lock()
            .iter()
            .find(|l| l.ref_log_id == Some(ref_log_id))
            .cloned())
    }
}

#[derive(Default)]
struct InMemoryPermissionRequests(Mutex<HashMap<Uuid, PermissionRequest>>);

#[async_trait]
impl PermissionStore for InMemoryPermissionRequests {
    async fn load_by_log_id(&self, log_id: Uuid) -> Result<Option<PermissionRequest>> {
        Ok(self.0.lock().values().find(|r| r.log_id == log_id).cloned())
    }
    async fn save(&self, request: PermissionRequest) -> Result<()> {
        self.0.lock().insert(request.id, request);
        Ok(())
    }
    async fn list_for_user(&self, _user_id: Uuid) -> Result<Vec<PermissionRequest>> {
        Ok(self.0.lock().values().cloned().collect())
    }
}

#[derive(Default)]
struct InMemoryApiKeys(Mutex<Vec<ApiKey>>);

#[async_trait]
impl ApiKeyStore for InMemoryApiKeys {
    async fn save(&self, api_key: ApiKey) -> Result<()> {
        self.0.lock().push(api_key);
        Ok(())
    }
    async fn load_by_key(&self, key: &str) -> Result<Option<ApiKey>> {
        Ok(self.0.lock().iter().find(|k| k.key == key).cloned())
    }
}

#[derive(Default)]
struct InMemoryKeys(Mutex<Vec<Key>>);

#[async_trait]
impl KeyStore for InMemoryKeys {
    async fn create(&self, key: Key) -> Result<Key> {
        self.0.lock().push(key.clone());
        Ok(key)
    }
    async fn load_by_id(&self, id: Uuid) -> Result<Option<Key>> {
        Ok(self.0.lock().iter().find(|k| k.id == id).cloned())
    }
    async fn load_by_grant_for_owner(&self, owner: KeyOwner, grant: Grant) -> Result<Option<Key>> {
        Ok(self
            .0
            .lock()
            .iter()
            .find(|k| k.owner == owner && k.grant == grant)
            .cloned())
    }
    async fn load_unacquired_shared_for_user(&self, user_id: Uuid) -> Result<Vec<Key>> {
        let all = self.0.lock().clone();
        Ok(all
            .iter()
            .filter(|k| {
                sharelog_core::vault::is_unacquired_shared_for_user(k, user_id, &all)
            })
            .cloned()
            .collect())
    }
    async fn load_unacquired_shared_for_user_and_log(
        &self,
        user_id: Uuid,
        log_id: Uuid,
    ) -> Result<Option<Key>> {
        let all = self.0.lock().clone();
        Ok(all
            .iter()
            .find(|k| {
                k.log_id == Some(log_id)
                    && sharelog_core::vault::is_unacquired_shared_for_user(k, user_id, &all)
            })
            .cloned())
    }
    async fn load_acquired_shared_for(&self, user_id: Uuid, log_id: Uuid) -> Result<Option<Key>> {
        Ok(self
            .0
            .lock()
            .iter()
            .find(|k| {
                k.grant == Grant::Shared
                    && k.log_id == Some(log_id)
                    && k.owner.user_id() == Some(user_id)
            })
            .cloned())
    }
    async fn save(&self, key: Key) -> Result<()> {
        self.0.lock().push(key);
        Ok(())
    }
    async fn save_all(&self, mut keys: Vec<Key>) -> Result<()> {
        self.0.lock().append(&mut keys);
        Ok(())
    }
    async fn delete_many(&self, ids: &[Uuid]) -> Result<()> {
        self.0.lock().retain(|k| !ids.contains(&k.id));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingMailer(Mutex<Vec<(String, String)>>);

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_invite_code(&self, to: &str, code: &str) -> std::result::Result<(), MailerError> {
        self.0.lock().push((to.to_string(), code.to_string()));
        Ok(())
    }
}

/// Bundles every collaborator an `AuthEngine`/`PermissionMachine`/`LogCryptor` needs,
/// all backed by the in-memory fixtures above.
struct Harness {
    users: Arc<InMemoryUsers>,
    invites: Arc<InMemoryInvites>,
    keys: Arc<InMemoryKeys>,
    api_keys: Arc<InMemoryApiKeys>,
    mailer: Arc<RecordingMailer>,
    logs: Arc<InMemoryLogs>,
    permission_requests: Arc<InMemoryPermissionRequests>,
}

impl Harness {
    fn new() -> Self {
        init_globals_once();
        Self {
            users: Arc::new(InMemoryUsers::default()),
            invites: Arc::new(InMemoryInvites::default()),
            keys: Arc::new(InMemoryKeys::default()),
            api_keys: Arc::new(InMemoryApiKeys::default()),
            mailer: Arc::new(RecordingMailer::default()),
            logs: Arc::new(InMemoryLogs::default()),
            permission_requests: Arc::new(InMemoryPermissionRequests::default()),
        }
    }

    fn auth(&self) -> AuthEngine {
        AuthEngine::new(
            self.users.clone(),
            self.invites.clone(),
            self.keys.clone(),
            self.api_keys.clone(),
            self.mailer.clone(),
        )
    }

    fn permissions(&self) -> PermissionMachine<'_> {
        PermissionMachine::new(self.permission_requests.as_ref(), self.keys.as_ref())
    }

    fn log_cryptor(&self) -> LogCryptor<'_> {
        LogCryptor::new(self.logs.as_ref(), self.keys.as_ref())
    }
}

// ---------------------------------------------------------------------------
// S1 — first-user bootstrap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s1_first_user_bootstrap() {
    let harness = Harness::new();
    let auth = harness.auth();

    let (user, token) = auth
        .sign_up_first_user("a@x", "Abcdef1!")
        .await
        .expect("first user signs up");

    assert_eq!(user.grant, Grant::Owner);
    assert_eq!(user.keys.len(), 2);
    assert!(user.key_with_grant(Grant::Owner).is_some());
    assert!(user.key_with_grant(Grant::Client).is_some());
    assert!(!token.is_empty());

    let session_key =
        sharelog_core::keyring::derive_user_session_key("Abcdef1!", &user.encryption_key_salt);
    for key in &user.keys {
        assert!(sharelog_core::keyring::unwrap_key(key, &session_key).is_ok());
    }

    assert_eq!(harness.users.0.lock().len(), 1);
}

// ---------------------------------------------------------------------------
// S2 — invite a client
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s2_invite_a_client() {
    let harness = Harness::new();
    let auth = harness.auth();

    let (owner, _token) = auth
        .sign_up_first_user("owner@x", "Abcdef1!")
        .await
        .unwrap();
    let owner_session_key =
        sharelog_core::keyring::derive_user_session_key("Abcdef1!", &owner.encryption_key_salt);

    let invite = auth
        .create_invite(&owner, &owner_session_key, Grant::Client, "invitee@x")
        .await
        .unwrap();

    assert_eq!(invite.grant, Grant::Client);
    // Only the Client-grant key is carried — the Owner key is filtered out (authority
    // filter, §4.C / §8 invariant 4).
    assert_eq!(invite.keys.len(), 1);
    assert_eq!(invite.keys[0].grant, Grant::Client);

    assert!(sharelog_core::crypto::wrap::verify_secret(
        "not-the-code",
        &invite.hash_salt,
        &invite.code_hash
    )
    .map(|ok| !ok)
    .unwrap_or(true));

    assert_eq!(harness.mailer.0.lock().len(), 1);
    assert_eq!(harness.mailer.0.lock()[0].0, "invitee@x");
}

// ---------------------------------------------------------------------------
// S3 — consume invite
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s3_consume_invite() {
    let harness = Harness::new();
    let auth = harness.auth();

    let (owner, _) = auth.sign_up_first_user("owner2@x", "Abcdef1!").await.unwrap();
    let owner_session_key =
        sharelog_core::keyring::derive_user_session_key("Abcdef1!", &owner.encryption_key_salt);
    let owner_client_key = owner.key_with_grant(Grant::Client).unwrap();
    let owner_client_pair =
        sharelog_core::keyring::unwrap_key(owner_client_key, &owner_session_key).unwrap();

    // The code is generated and recorded inside `create_invite`; extract it via the
    // mailer fixture rather than re-deriving it, mirroring how an out-of-band email
    // would hand it to the invitee.
    auth.create_invite(&owner, &owner_session_key, Grant::Client, "invitee2@x")
        .await
        .unwrap();
    let code = harness.mailer.0.lock().last().unwrap().1.clone();
    let invite_id = *harness.invites.0.lock().keys().next().unwrap();

    let (new_user, token) = auth
        .sign_up_via_invite(invite_id, &code, "invitee2@x", "Zyxwvu2@")
        .await
        .expect("consuming the invite with the right code succeeds");

    assert!(!token.is_empty());
    assert_eq!(new_user.grant, Grant::Client);
    assert_eq!(new_user.email, "invitee2@x");
    assert_eq!(new_user.keys_with_grant(Grant::Client).count(), 1);

    let new_session_key = sharelog_core::keyring::derive_user_session_key(
        "Zyxwvu2@",
        &new_user.encryption_key_salt,
    );
    let new_client_key = new_user.key_with_grant(Grant::Client).unwrap();
    let new_client_pair =
        sharelog_core::keyring::unwrap_key(new_client_key, &new_session_key).unwrap();

    assert_eq!(
        new_client_pair.private_key_hex(),
        owner_client_pair.private_key_hex(),
        "the invited user's Client key must unwrap to the same scalar as the inviter's"
    );

    // The invite and its keys are gone.
    assert!(harness.invites.0.lock().get(&invite_id).is_none());
}

// ---------------------------------------------------------------------------
// S4 — log ingestion and owner retrieval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s4_log_ingest_and_owner_retrieval() {
    let harness = Harness::new();
    let auth = harness.auth();
    let cryptor = harness.log_cryptor();

    let (owner, _) = auth.sign_up_first_user("owner3@x", "Abcdef1!").await.unwrap();
    let session_key =
        sharelog_core::keyring::derive_user_session_key("Abcdef1!", &owner.encryption_key_salt);

    let client_key = owner.key_with_grant(Grant::Client).unwrap();
    let owner_key = owner.key_with_grant(Grant::Owner).unwrap();
    let client_pair = sharelog_core::keyring::unwrap_key(client_key, &session_key).unwrap();
    let owner_pair = sharelog_core::keyring::unwrap_key(owner_key, &session_key).unwrap();

    let plaintext = b"panic: index out of range [10] with length 3";
    let client_encrypted =
        EciesKeyPair::encrypt(client_pair.public_key(), plaintext).unwrap();

    let log = cryptor
        .save_log(&client_encrypted.to_bytes(), &owner_pair)
        .await
        .unwrap();

    let decrypted = cryptor
        .get_decrypted_log(&owner, &session_key, log.id)
        .await
        .unwrap();
    assert_eq!(decrypted, plaintext);

    // Wrong session key fails with a crypto error, not a silent garbage result.
    let wrong_session_key = vec![0u8; 32];
    assert!(cryptor
        .get_decrypted_log(&owner, &wrong_session_key, log.id)
        .await
        .is_err());
}

// ---------------------------------------------------------------------------
// S5 — delegated access
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s5_delegated_access() {
    let harness = Harness::new();
    let auth = harness.auth();
    let permissions = harness.permissions();
    let cryptor = harness.log_cryptor();

    let (owner, _) = auth.sign_up_first_user("owner4@x", "Abcdef1!").await.unwrap();
    let owner_session_key =
        sharelog_core::keyring::derive_user_session_key("Abcdef1!", &owner.encryption_key_salt);

    auth.create_invite(&owner, &owner_session_key, Grant::Client, "client@x")
        .await
        .unwrap();
    let code = harness.mailer.0.lock().last().unwrap().1.clone();
    let invite_id = *harness.invites.0.lock().keys().next().unwrap();
    let (_client_user, _) = auth
        .sign_up_via_invite(invite_id, &code, "client@x", "Zyxwvu2@")
        .await
        .unwrap();

    // Ingest a log under the owner's keys.
    let client_key = owner.key_with_grant(Grant::Client).unwrap();
    let owner_key = owner.key_with_grant(Grant::Owner).unwrap();
    let client_pair =
        sharelog_core::keyring::unwrap_key(client_key, &owner_session_key).unwrap();
    let owner_pair = sharelog_core::keyring::unwrap_key(owner_key, &owner_session_key).unwrap();
    let plaintext = b"panic: nil pointer dereference";
    let client_encrypted = EciesKeyPair::encrypt(client_pair.public_key(), plaintext).unwrap();
    let log = cryptor
        .save_log(&client_encrypted.to_bytes(), &owner_pair)
        .await
        .unwrap();

    // Client requests access; owner approves, minting a shared-key template.
    permissions.request_permission(log.id).await.unwrap();
    let (request, _template) = permissions.approve_permission(log.id).await.unwrap();
    assert_eq!(
        request.status,
        sharelog_core::model::PermissionStatus::Approved
    );

    // Client signs in again: shared-key acquisition materializes a copy of the
    // template under the client's own session key (§4.C, §8 invariant 5).
    let (client_user, _token) = auth.sign_in("client@x", "Zyxwvu2@").await.unwrap();
    assert!(client_user.shared_key_for_log(log.id).is_some());

    // Re-running sign-in is idempotent: still exactly one acquired copy.
    let (client_user_again, _) = auth.sign_in("client@x", "Zyxwvu2@").await.unwrap();
    let acquired_count = client_user_again
        .keys
        .iter()
        .filter(|k| k.grant == Grant::Shared && k.log_id == Some(log.id))
        .count();
    assert_eq!(acquired_count, 1, "shared-key acquisition must be idempotent");

    assert!(cryptor
        .have_access_to_log(&client_user, log.id)
        .await
        .unwrap());

    // Owner creates the client-accessible copy.
    let acquired_shared_key = client_user.shared_key_for_log(log.id).unwrap();
    let ref_log = cryptor
        .create_with_client_access(
            &owner,
            &owner_session_key,
            log.id,
            &client_pair,
            &acquired_shared_key.public_key_hex,
        )
        .await
        .unwrap();
    assert_eq!(ref_log.ref_log_id, Some(log.id));

    // Client retrieves and gets back the original plaintext.
    let client_session_key = sharelog_core::keyring::derive_user_session_key(
        "Zyxwvu2@",
        &client_user.encryption_key_salt,
    );
    let decrypted = cryptor
        .get_decrypted_log(&client_user, &client_session_key, log.id)
        .await
        .unwrap();
    assert_eq!(decrypted, plaintext);
}

// ---------------------------------------------------------------------------
// S6 — wrong invite code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s6_wrong_invite_code() {
    let harness = Harness::new();
    let auth = harness.auth();

    let (owner, _) = auth.sign_up_first_user("owner5@x", "Abcdef1!").await.unwrap();
    let owner_session_key =
        sharelog_core::keyring::derive_user_session_key("Abcdef1!", &owner.encryption_key_salt);

    auth.create_invite(&owner, &owner_session_key, Grant::Client, "invitee5@x")
        .await
        .unwrap();
    let invite_id = *harness.invites.0.lock().keys().next().unwrap();

    let result = auth
        .sign_up_via_invite(invite_id, "definitely-the-wrong-code", "invitee5@x", "Zyxwvu2@")
        .await;

    assert!(matches!(result, Err(sharelog_core::Error::BadInvite(_))));
    // The invite and its keys remain intact.
    assert!(harness.invites.0.lock().get(&invite_id).is_some());
    assert_eq!(harness.users.0.lock().len(), 1, "no user was created");
}

// ---------------------------------------------------------------------------
// API-key issuance and the App-principal token variant (§4.D)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn api_key_binds_to_client_key_and_app_token_announces_it() {
    let harness = Harness::new();
    let auth = harness.auth();

    let (owner, _) = auth.sign_up_first_user("owner6@x", "Abcdef1!").await.unwrap();
    let api_key = auth.generate_api_key(&owner).await.unwrap();
    assert_eq!(api_key.key.len(), 32);

    let token = auth.issue_app_token(&api_key).await.unwrap();

    let key_material = sharelog_core::auth::KeyMaterial::global();
    match sharelog_core::auth::token::parse_token(&token, key_material).unwrap() {
        sharelog_core::auth::ParsedToken::App { claims, grant } => {
            assert_eq!(grant, Grant::App);
            let client_key = owner.key_with_grant(Grant::Client).unwrap();
            assert_eq!(claims.encoded_pub_key, client_key.public_key_hex);
        }
        sharelog_core::auth::ParsedToken::User { .. } => panic!("expected an App token"),
    }
}
