//! Service-wide JWE/JWS key material (§5 "global key material loading", §6).
//!
//! Loaded once at process start from the four PEM files named in
//! [`crate::config::KeyPaths`] and cached for the process lifetime behind a
//! `once_cell::sync::OnceCell`, the established convention for global, init-once
//! process state in this codebase.
//! Private-key files may be in either PKCS#8 or SEC1 EC format; the loader attempts
//! both, in that order.

use std::fs;
use std::path::Path;

use once_cell::sync::OnceCell;
use p521::ecdsa::{SigningKey, VerifyingKey};
use p521::pkcs8::DecodePrivateKey as _;
use p521::pkcs8::DecodePublicKey as _;
use p521::SecretKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

use crate::config::KeyPaths;

#[derive(Error, Debug)]
pub enum KeyMaterialError {
    #[error("failed to read key file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse key file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("key material already initialized")]
    AlreadyInitialized,
}

/// The service-wide key material needed to issue and parse token envelopes.
pub struct KeyMaterial {
    pub jwe_public: RsaPublicKey,
    pub jwe_private: RsaPrivateKey,
    pub jws_signing: SigningKey,
    pub jws_verifying: VerifyingKey,
}

static KEY_MATERIAL: OnceCell<KeyMaterial> = OnceCell::new();

impl KeyMaterial {
    pub fn load(paths: &KeyPaths) -> Result<Self, KeyMaterialError> {
        let jwe_public_pem = read_pem(&paths.jwe_pub)?;
        let jwe_private_pem = read_pem(&paths.jwe_priv)?;
        let jws_public_pem = read_pem(&paths.jws_pub)?;
        let jws_private_pem = read_pem(&paths.jws_priv)?;

        let jwe_public = RsaPublicKey::from_public_key_pem(&jwe_public_pem)
            .map_err(|e| parse_err(&paths.jwe_pub, e))?;
        let jwe_private = RsaPrivateKey::from_pkcs8_pem(&jwe_private_pem)
            .map_err(|e| parse_err(&paths.jwe_priv, e))?;

        let jws_verifying = VerifyingKey::from_public_key_pem(&jws_public_pem)
            .map_err(|e| parse_err(&paths.jws_pub, e.to_string()))?;
        let jws_signing = load_jws_signing_key(&paths.jws_priv, &jws_private_pem)?;

        Ok(KeyMaterial {
            jwe_public,
            jwe_private,
            jws_signing,
            jws_verifying,
        })
    }

    /// Load key material and install it as the process-wide global, once.
    pub fn init_global(paths: &KeyPaths) -> Result<&'static KeyMaterial, KeyMaterialError> {
        let material = Self::load(paths)?;
        KEY_MATERIAL
            .set(material)
            .map_err(|_| KeyMaterialError::AlreadyInitialized)?;
        Ok(KEY_MATERIAL.get().expect("just set"))
    }

    /// Access the process-wide key material.
    ///
    /// # Panics
    /// Panics if [`KeyMaterial::init_global`] has not been called yet.
    pub fn global() -> &'static KeyMaterial {
        KEY_MATERIAL
            .get()
            .expect("KeyMaterial::init_global must be called before KeyMaterial::global")
    }
}

/// Attempt PKCS#8 first, then SEC1 EC format, matching §6's "loader must attempt
/// both".
fn load_jws_signing_key(path: &Path, pem: &str) -> Result<SigningKey, KeyMaterialError> {
    if let Ok(key) = SigningKey::from_pkcs8_pem(pem) {
        return Ok(key);
    }
    let secret = SecretKey::from_sec1_pem(pem)
        .map_err(|e| parse_err(path, format!("neither PKCS#8 nor SEC1: {e}")))?;
    Ok(SigningKey::from(secret))
}

fn read_pem(path: &Path) -> Result<String, KeyMaterialError> {
    fs::read_to_string(path).map_err(|source| KeyMaterialError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn parse_err(path: &Path, reason: impl ToString) -> KeyMaterialError {
    KeyMaterialError::Parse {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
