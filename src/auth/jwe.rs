//! Compact JWE, key-management = RSA1_5, content-encryption = A128CBC-HS256 (§6).
//!
//! As with `jws.rs`, no single crate in the dependency stack assembles this pairing,
//! so it is hand-rolled from composable primitives (`rsa`, `aes`+`cbc`, `hmac`,
//! `sha2`) following RFC 7518 §5.2.3 for the content-encryption construction, the
//! same compositional approach `crypto::asymmetric`'s ECIES envelope and
//! `jws.rs`'s compact serialization already take.

use aes::Aes128;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const CEK_LEN: usize = 32; // 16-byte MAC key + 16-byte AES-128 key
const TAG_LEN: usize = 16;
const IV_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum JweError {
    #[error("RSA key-wrap failed: {0}")]
    KeyWrapFailed(String),

    #[error("RSA key-unwrap failed: {0}")]
    KeyUnwrapFailed(String),

    #[error("content encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("content decryption failed: authentication error or corrupted data")]
    DecryptionFailed,

    #[error("malformed compact serialization")]
    Malformed,

    #[error("header serialization failed: {0}")]
    Serialization(String),
}

pub type JweResult<T> = Result<T, JweError>;

#[derive(Serialize, serde::Deserialize)]
struct JweHeader<'a> {
    alg: &'a str,
    enc: &'a str,
}

/// Encrypt `payload` (typically a compact JWS) into a compact JWE under `public_key`.
pub fn encrypt(payload: &[u8], public_key: &RsaPublicKey) -> JweResult<String> {
    let mut rng = rand::rngs::OsRng;

    let mut cek = [0u8; CEK_LEN];
    rng.fill_bytes(&mut cek);
    let mac_key = &cek[..16];
    let enc_key = &cek[16..];

    let encrypted_key = public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &cek)
        .map_err(|e| JweError::KeyWrapFailed(e.to_string()))?;

    let header = JweHeader {
        alg: "RSA1_5",
        enc: "A128CBC-HS256",
    };
    let header_b64 = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&header).map_err(|e| JweError::Serialization(e.to_string()))?,
    );

    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let mut buf = pkcs7_pad(payload);
    let msg_len = buf.len();
    let ciphertext = Aes128CbcEnc::new(enc_key.into(), &iv.into())
        .encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf, msg_len)
        .map_err(|e| JweError::EncryptionFailed(e.to_string()))?
        .to_vec();

    let tag = compute_tag(mac_key, header_b64.as_bytes(), &iv, &ciphertext);

    Ok(format!(
        "{header_b64}.{}.{}.{}.{}",
        URL_SAFE_NO_PAD.encode(&encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(&ciphertext),
        URL_SAFE_NO_PAD.encode(tag),
    ))
}

/// Decrypt a compact JWE under `private_key`, returning the original payload bytes.
pub fn decrypt(compact: &str, private_key: &RsaPrivateKey) -> JweResult<Vec<u8>> {
    let parts: Vec<&str> = compact.split('.').collect();
    let [header_b64, encrypted_key_b64, iv_b64, ciphertext_b64, tag_b64] = parts[..] else {
        return Err(JweError::Malformed);
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| JweError::Malformed)?;
    let header: JweHeader =
        serde_json::from_slice(&header_bytes).map_err(|_| JweError::Malformed)?;
    if header.alg != "RSA1_5" || header.enc != "A128CBC-HS256" {
        return Err(JweError::Malformed);
    }

    let encrypted_key = URL_SAFE_NO_PAD
        .decode(encrypted_key_b64)
        .map_err(|_| JweError::Malformed)?;
    let iv = URL_SAFE_NO_PAD
        .decode(iv_b64)
        .map_err(|_| JweError::Malformed)?;
    let ciphertext = URL_SAFE_NO_PAD
        .decode(ciphertext_b64)
        .map_err(|_| JweError::Malformed)?;
    let tag = URL_SAFE_NO_PAD
        .decode(tag_b64)
        .map_err(|_| JweError::Malformed)?;

    if iv.len() != IV_LEN {
        return Err(JweError::Malformed);
    }

    let cek = private_key
        .decrypt(Pkcs1v15Encrypt, &encrypted_key)
        .map_err(|e| JweError::KeyUnwrapFailed(e.to_string()))?;
    if cek.len() != CEK_LEN {
        return Err(JweError::KeyUnwrapFailed(
            "unwrapped content-encryption key has unexpected length".into(),
        ));
    }
    let mac_key = &cek[..16];
    let enc_key = &cek[16..];

    let expected_tag = compute_tag(mac_key, header_b64.as_bytes(), &iv, &ciphertext);
    if expected_tag != tag.as_slice() {
        return Err(JweError::DecryptionFailed);
    }

    let mut buf = ciphertext;
    let iv_arr: [u8; IV_LEN] = iv.try_into().map_err(|_| JweError::Malformed)?;
    let padded = Aes128CbcDec::new(enc_key.into(), &iv_arr.into())
        .decrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf)
        .map_err(|_| JweError::DecryptionFailed)?;

    pkcs7_unpad(padded).ok_or(JweError::DecryptionFailed)
}

/// MAC input per RFC 7518 §5.2.2.1: `AAD || IV || ciphertext || AL`, where `AL` is the
/// 64-bit big-endian bit-length of the AAD (the ASCII protected header).
fn compute_tag(mac_key: &[u8], aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let al = ((aad.len() as u64) * 8).to_be_bytes();
    let mut mac = HmacSha256::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&al);
    let full = mac.finalize().into_bytes();
    full[..TAG_LEN].to_vec()
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let block_size = 16;
    let padding = block_size - (data.len() % block_size);
    let mut out = Vec::with_capacity(data.len() + padding);
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(padding as u8).take(padding));
    out
}

fn pkcs7_unpad(data: &[u8]) -> Option<Vec<u8>> {
    let &pad_len = data.last()?;
    let pad_len = pad_len as usize;
    if pad_len == 0 || pad_len > data.len() {
        return None;
    }
    Some(data[..data.len() - pad_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        (private_key, public_key)
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let (private_key, public_key) = keypair();
        let payload = b"a compact JWS goes here";
        let jwe = encrypt(payload, &public_key).unwrap();
        let decrypted = decrypt(&jwe, &private_key).unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn tampered_ciphertext_fails_tag_check() {
        let (private_key, public_key) = keypair();
        let jwe = encrypt(b"payload", &public_key).unwrap();
        let mut parts: Vec<String> = jwe.split('.').map(String::from).collect();
        let mut ct = URL_SAFE_NO_PAD.decode(&parts[3]).unwrap();
        ct[0] ^= 0xFF;
        parts[3] = URL_SAFE_NO_PAD.encode(ct);
        let tampered = parts.join(".");
        assert!(decrypt(&tampered, &private_key).is_err());
    }

    #[test]
    fn wrong_private_key_fails() {
        let (_, public_key) = keypair();
        let (other_private_key, _) = keypair();
        let jwe = encrypt(b"payload", &public_key).unwrap();
        assert!(decrypt(&jwe, &other_private_key).is_err());
    }
}
