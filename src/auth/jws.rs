//! Compact JWS, alg = ES512 (ECDSA on P-521) (§6).
//!
//! No crate in this codebase's dependency stack speaks ES512 (the commonly used
//! `jsonwebtoken` crate tops out at ES384), so this hand-rolls the compact
//! serialization — `base64url(header).base64url(payload).base64url(signature)` —
//! over the real `p521` signing primitive, the same way `crypto::asymmetric` hand
//! rolls an ECIES envelope instead of reaching for an all-in-one crate.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use p521::ecdsa::signature::{Signer, Verifier};
use p521::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JwsError {
    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("malformed compact serialization")]
    Malformed,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("claims serialization failed: {0}")]
    Serialization(String),
}

pub type JwsResult<T> = Result<T, JwsError>;

#[derive(Serialize, serde::Deserialize)]
struct JwsHeader<'a> {
    alg: &'a str,
    typ: &'a str,
}

/// Produce a compact JWS (`header.payload.signature`) over `claims`, signed with
/// ES512 under `signing_key`.
pub fn sign<T: Serialize>(claims: &T, signing_key: &SigningKey) -> JwsResult<String> {
    let header = JwsHeader {
        alg: "ES512",
        typ: "JWT",
    };
    let header_b64 = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&header).map_err(|e| JwsError::Serialization(e.to_string()))?,
    );
    let payload_b64 = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(claims).map_err(|e| JwsError::Serialization(e.to_string()))?,
    );
    let signing_input = format!("{header_b64}.{payload_b64}");

    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a compact JWS and return the deserialized claims.
pub fn verify<T: DeserializeOwned>(compact: &str, verifying_key: &VerifyingKey) -> JwsResult<T> {
    let mut parts = compact.split('.');
    let header_b64 = parts.next().ok_or(JwsError::Malformed)?;
    let payload_b64 = parts.next().ok_or(JwsError::Malformed)?;
    let signature_b64 = parts.next().ok_or(JwsError::Malformed)?;
    if parts.next().is_some() {
        return Err(JwsError::Malformed);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| JwsError::Malformed)?;
    let header: JwsHeader =
        serde_json::from_slice(&header_bytes).map_err(|_| JwsError::Malformed)?;
    if header.alg != "ES512" {
        return Err(JwsError::UnsupportedAlgorithm(header.alg.to_string()));
    }

    let signature_bytes = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| JwsError::Malformed)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| JwsError::Malformed)?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| JwsError::InvalidSignature)?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| JwsError::Malformed)?;
    serde_json::from_slice(&payload_bytes).map_err(|e| JwsError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Claims {
        sub: String,
        exp: i64,
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);

        let claims = Claims {
            sub: "user-1".into(),
            exp: 1_999_999_999,
        };

        let token = sign(&claims, &signing_key).unwrap();
        let recovered: Claims = verify(&token, &verifying_key).unwrap();
        assert_eq!(claims, recovered);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let claims = Claims {
            sub: "user-1".into(),
            exp: 1,
        };
        let token = sign(&claims, &signing_key).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let tampered_payload = URL_SAFE_NO_PAD.encode(b"{\"sub\":\"attacker\",\"exp\":9999999999}");
        parts[1] = &tampered_payload;
        let tampered = parts.join(".");

        let result: JwsResult<Claims> = verify(&tampered, &verifying_key);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signing_key = SigningKey::random(&mut OsRng);
        let other_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&other_key);
        let claims = Claims {
            sub: "user-1".into(),
            exp: 1,
        };
        let token = sign(&claims, &signing_key).unwrap();
        let result: JwsResult<Claims> = verify(&token, &verifying_key);
        assert!(result.is_err());
    }
}
