//! # Primitives (§4.A)
//!
//! Symmetric AES-CBC wrap/unwrap with the source system's non-standard padding,
//! password-based key derivation, password/invite-code hashing, and salt generation.
//!
//! ## Padding quirk
//!
//! Plaintext is padded with bytes whose value equals the pad length (PKCS-7-style),
//! *except* that padding is omitted entirely when the plaintext already equals the
//! block size. Unwrapping does not recover the original length from the final byte;
//! the caller passes it explicitly. This is faithfully reproduced from
//! `lib/cryto.go`'s `Pad`/`Unpad` rather than normalized to strict PKCS-7, so that
//! existing wrapped key material remains byte-compatible (§9 open question 2).

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use thiserror::Error;

const AES_KEY_LEN: usize = 32;
const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Primitive-layer errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("cipher initialization failed: {0}")]
    CipherInit(String),

    #[error("random number generation failed: {0}")]
    Rng(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Zero-pad `key` on the right to `AES_KEY_LEN` bytes. Behavior for keys longer than
/// `AES_KEY_LEN` is to truncate, applied identically by both encrypt and decrypt so
/// that the invariant ("same padding on both sides") holds (§4.A).
fn pad_key(key: &[u8]) -> [u8; AES_KEY_LEN] {
    let mut padded = [0u8; AES_KEY_LEN];
    let n = key.len().min(AES_KEY_LEN);
    padded[..n].copy_from_slice(&key[..n]);
    padded
}

/// Pad `src` to a multiple of `block_size`, PKCS-7 style, except that plaintext whose
/// length already equals `block_size` is returned unpadded.
fn pad(src: &[u8], block_size: usize) -> Vec<u8> {
    if src.len() == block_size {
        return src.to_vec();
    }
    let padding = block_size - (src.len() % block_size);
    let mut out = Vec::with_capacity(src.len() + padding);
    out.extend_from_slice(src);
    out.extend(std::iter::repeat(padding as u8).take(padding));
    out
}

/// Strip padding by trusting the caller-supplied original length rather than the
/// trailing pad byte.
fn unpad(src: &[u8], unpadded_len: usize) -> CryptoResult<Vec<u8>> {
    if unpadded_len > src.len() {
        return Err(CryptoError::MalformedInput(
            "unpadded length exceeds ciphertext length".into(),
        ));
    }
    Ok(src[..unpadded_len].to_vec())
}

/// Symmetric encryption result: `(ciphertext, iv)`, both opaque byte strings.
#[derive(Debug, Clone)]
pub struct Wrapped {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a fresh random IV (§4.A).
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> CryptoResult<Wrapped> {
    let key = pad_key(key);
    let mut iv = [0u8; BLOCK_SIZE];
    rand::rngs::OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;

    let mut buf = pad(plaintext, BLOCK_SIZE);
    let msg_len = buf.len();

    let encryptor = Aes256CbcEnc::new(&key.into(), &iv.into());
    let ciphertext = encryptor
        .encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf, msg_len)
        .map_err(|e| CryptoError::CipherInit(e.to_string()))?
        .to_vec();

    Ok(Wrapped {
        ciphertext,
        iv: iv.to_vec(),
    })
}

/// Decrypt `ciphertext` under `key` and `iv`, trusting `plaintext_len` to locate the
/// original plaintext within the (possibly unpadded) decrypted block stream.
pub fn decrypt(
    ciphertext: &[u8],
    plaintext_len: usize,
    iv: &[u8],
    key: &[u8],
) -> CryptoResult<Vec<u8>> {
    if iv.len() != BLOCK_SIZE {
        return Err(CryptoError::MalformedInput(format!(
            "iv must be {} bytes, got {}",
            BLOCK_SIZE,
            iv.len()
        )));
    }
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::MalformedInput(
            "ciphertext is not a multiple of the block size".into(),
        ));
    }

    let key = pad_key(key);
    let mut buf = ciphertext.to_vec();
    let decryptor = Aes256CbcDec::new(&key.into(), iv.into());
    let padded = decryptor
        .decrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf)
        .map_err(|e| CryptoError::CipherInit(e.to_string()))?;

    unpad(padded, plaintext_len)
}

/// Wrap a private scalar's hex serialization under a symmetric key (the "Wrap" of the
/// glossary).
pub fn wrap_private_hex(private_hex: &str, key: &[u8]) -> CryptoResult<Wrapped> {
    encrypt(private_hex.as_bytes(), key)
}

/// Unwrap a private scalar's hex serialization.
pub fn unwrap_private_hex(
    ciphertext: &[u8],
    plaintext_len: usize,
    iv: &[u8],
    key: &[u8],
) -> CryptoResult<String> {
    let bytes = decrypt(ciphertext, plaintext_len, iv, key)?;
    String::from_utf8(bytes).map_err(|e| CryptoError::MalformedInput(e.to_string()))
}

/// Hash a password or invite code for storage, using bcrypt over `secret || salt`.
pub fn hash_secret(secret: &str, salt: &str) -> CryptoResult<String> {
    let combined = format!("{secret}{salt}");
    bcrypt::hash(combined, bcrypt::DEFAULT_COST).map_err(|e| CryptoError::CipherInit(e.to_string()))
}

/// Verify a password or invite code against a stored bcrypt hash.
pub fn verify_secret(secret: &str, salt: &str, hash: &str) -> CryptoResult<bool> {
    let combined = format!("{secret}{salt}");
    bcrypt::verify(combined, hash).map_err(|e| CryptoError::CipherInit(e.to_string()))
}

const SALT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SALT_LEN: usize = 32;

/// Generate a cryptographically random 32-character salt from `[A-Za-z]` with uniform
/// selection (§4.A).
pub fn generate_salt() -> CryptoResult<String> {
    generate_random_string(SALT_LEN)
}

/// Generate a cryptographically random string of `len` characters from `[A-Za-z]`,
/// used both for salts and for invite codes / API keys.
pub fn generate_random_string(len: usize) -> CryptoResult<String> {
    let mut rng = rand::rngs::OsRng;
    let mut out = String::with_capacity(len);
    // Rejection sampling keeps selection uniform over the 52-letter alphabet rather
    // than introducing modulo bias.
    while out.len() < len {
        let mut byte = [0u8; 1];
        rng.try_fill_bytes(&mut byte)
            .map_err(|e| CryptoError::Rng(e.to_string()))?;
        if (byte[0] as usize) < (256 - 256 % SALT_ALPHABET.len()) {
            out.push(SALT_ALPHABET[byte[0] as usize % SALT_ALPHABET.len()] as char);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_round_trip() {
        let key = b"some_32_byte_session_symm_key!!";
        let wrapped = encrypt(b"hello world, this is a private scalar hex", key).unwrap();
        let plaintext = decrypt(
            &wrapped.ciphertext,
            b"hello world, this is a private scalar hex".len(),
            &wrapped.iv,
            key,
        )
        .unwrap();
        assert_eq!(plaintext, b"hello world, this is a private scalar hex");
    }

    #[test]
    fn wrap_unwrap_exact_block_size_plaintext() {
        let key = b"another_session_symmetric_key!!!";
        let plaintext = b"exactly16bytes!!"; // 16 bytes, triggers the no-padding path
        assert_eq!(plaintext.len(), BLOCK_SIZE);
        let wrapped = encrypt(plaintext, key).unwrap();
        let out = decrypt(&wrapped.ciphertext, plaintext.len(), &wrapped.iv, key).unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn wrong_key_does_not_reproduce_plaintext() {
        let key = b"correct_key_2222222222222222222";
        let wrong_key = b"wrong_key_333333333333333333333";
        let plaintext = b"a private scalar";
        let wrapped = encrypt(plaintext, key).unwrap();
        let out = decrypt(&wrapped.ciphertext, plaintext.len(), &wrapped.iv, wrong_key).unwrap();
        assert_ne!(out, plaintext);
    }

    #[test]
    fn salt_has_expected_length_and_alphabet() {
        let salt = generate_salt().unwrap();
        assert_eq!(salt.len(), 32);
        assert!(salt.bytes().all(|b| b.is_ascii_alphabetic()));
    }

    #[test]
    fn salts_are_not_constant() {
        let a = generate_salt().unwrap();
        let b = generate_salt().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn password_hash_round_trip() {
        let salt = generate_salt().unwrap();
        let hash = hash_secret("Abcdef1!", &salt).unwrap();
        assert!(verify_secret("Abcdef1!", &salt, &hash).unwrap());
        assert!(!verify_secret("wrong", &salt, &hash).unwrap());
    }

    proptest::proptest! {
        /// §8 property 1: unwrap(wrap(p, k), k) = p for arbitrary plaintexts and keys.
        #[test]
        fn wrap_unwrap_round_trip_prop(
            plaintext in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256),
            key in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..64),
        ) {
            let wrapped = encrypt(&plaintext, &key).unwrap();
            let out = decrypt(&wrapped.ciphertext, plaintext.len(), &wrapped.iv, &key).unwrap();
            proptest::prop_assert_eq!(out, plaintext);
        }

        /// §8 property 1 (negative half): unwrapping with a different key never
        /// reproduces the original plaintext.
        #[test]
        fn wrap_unwrap_wrong_key_prop(
            plaintext in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..256),
            key in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..64),
            wrong_key in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..64),
        ) {
            proptest::prop_assume!(pad_key(&key) != pad_key(&wrong_key));
            let wrapped = encrypt(&plaintext, &key).unwrap();
            let out = decrypt(&wrapped.ciphertext, plaintext.len(), &wrapped.iv, &wrong_key).unwrap();
            proptest::prop_assert_ne!(out, plaintext);
        }
    }
}
