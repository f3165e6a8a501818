//! # Key Derivation
//!
//! The two KDF operations this system uses: PBKDF2-HMAC-SHA256 for deriving session
//! symmetric keys and passphrase-derived wrapping keys (§4.A, §4.C), and HKDF-SHA256
//! for ECIES key expansion (`crypto::asymmetric`). Argon2id and scrypt are dropped
//! here: nothing in this system derives a key by any means other than PBKDF2 or HKDF.

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KdfError {
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("invalid output length: {0}")]
    InvalidLength(String),
}

pub type KdfResult<T> = Result<T, KdfError>;

/// Derive a key via PBKDF2-HMAC-SHA256.
///
/// `iterations` comes from [`crate::config::Config::pbkdf2_iterations`] in
/// production; tests may pass a lower value directly.
pub fn derive_pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32, key_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; key_len];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

/// Expand key material using HKDF-SHA256.
pub fn expand_hkdf_sha256(
    input_key_material: &[u8],
    salt: Option<&[u8]>,
    info: Option<&[u8]>,
    output_length: usize,
) -> KdfResult<Vec<u8>> {
    if output_length > 255 * 32 {
        return Err(KdfError::InvalidLength(
            "HKDF-SHA256 maximum output length is 8160 bytes".into(),
        ));
    }
    let hkdf = Hkdf::<Sha256>::new(salt, input_key_material);
    let mut out = vec![0u8; output_length];
    hkdf.expand(info.unwrap_or(b""), &mut out)
        .map_err(|e| KdfError::DerivationFailed(e.to_string()))?;
    Ok(out)
}
