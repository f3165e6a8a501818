//! Session symmetric key derivation and token-claim encoding (§4.C).

use super::kdf::derive_pbkdf2_sha256;

const SESSION_KEY_LEN: usize = 32;

/// Derive the 32-byte session symmetric key that wraps every private half a user
/// owns, from their password and encryption-key salt.
pub fn derive_session_key(password: &str, encryption_key_salt: &str, pbkdf2_iterations: u32) -> Vec<u8> {
    derive_pbkdf2_sha256(
        password.as_bytes(),
        encryption_key_salt.as_bytes(),
        pbkdf2_iterations,
        SESSION_KEY_LEN,
    )
}

/// Derive a one-off passphrase-based key, e.g. `(invite_code, key_salt)` or
/// `(log_sharing_secret, template_salt)`, with the same PBKDF2 construction as the
/// session key (§4.C "assemble/consume invite key-set", §4.E "mint shared-key
/// template").
pub fn derive_passphrase_key(passphrase: &str, salt: &str, pbkdf2_iterations: u32) -> Vec<u8> {
    derive_pbkdf2_sha256(passphrase.as_bytes(), salt.as_bytes(), pbkdf2_iterations, SESSION_KEY_LEN)
}

/// Uppercase hex of the raw bytes, concatenated with no separators (§4.C "encode
/// symmetric key for token claim").
pub fn encode_symmetric_key(key: &[u8]) -> String {
    let mut out = String::with_capacity(key.len() * 2);
    for b in key {
        out.push_str(&format!("{b:02X}"));
    }
    out
}

/// Inverse of [`encode_symmetric_key`].
pub fn decode_symmetric_key(encoded: &str) -> Result<Vec<u8>, DecodeSymmetricKeyError> {
    if encoded.len() % 2 != 0 {
        return Err(DecodeSymmetricKeyError::OddLength);
    }
    (0..encoded.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&encoded[i..i + 2], 16)
                .map_err(|_| DecodeSymmetricKeyError::InvalidHex)
        })
        .collect()
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeSymmetricKeyError {
    #[error("encoded symmetric key has odd length")]
    OddLength,
    #[error("encoded symmetric key contains non-hex characters")]
    InvalidHex,
}
