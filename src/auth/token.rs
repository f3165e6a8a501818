//! Claims shapes and token issuance/parsing (§4.D "token issuance"/"token parsing and
//! validation", §6 "token envelope").
//!
//! A token is a nested JOSE envelope: an inner compact JWS (`jws.rs`, ES512) carrying
//! the claims, wrapped in an outer compact JWE (`jwe.rs`, RSA1_5 + A128CBC-HS256).
//! Human principals carry `userSymmetricKey`; App (machine) principals carry
//! `encodedPubKey` instead and have no `sub` (§6).

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::jwe;
use super::jws;
use super::keymaterial::KeyMaterial;
use crate::model::Grant;

const TOKEN_LIFETIME_HOURS: i64 = 24;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error(transparent)]
    Jws(#[from] jws::JwsError),

    #[error(transparent)]
    Jwe(#[from] jwe::JweError),

    #[error("token has expired")]
    Expired,

    #[error("unrecognized grant name: {0}")]
    UnknownGrant(String),

    #[error("claims did not match either known token shape")]
    UnrecognizedClaimsShape,
}

pub type TokenResult<T> = Result<T, TokenError>;

/// Claims carried by a human principal's token (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: Uuid,
    pub exp: i64,
    pub grant: String,
    #[serde(rename = "userSymmetricKey")]
    pub user_symmetric_key: String,
}

/// Claims carried by a machine (App) principal's token. No `sub` (§4.D, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppClaims {
    pub exp: i64,
    pub grant: String,
    #[serde(rename = "encodedPubKey")]
    pub encoded_pub_key: String,
}

/// The result of parsing and validating a token envelope: which claim shape it
/// carried, plus the resolved [`Grant`] (§4.D "authority-grant resolution").
#[derive(Debug, Clone)]
pub enum ParsedToken {
    User { claims: UserClaims, grant: Grant },
    App { claims: AppClaims, grant: Grant },
}

/// Issue a token for a human principal: `sub`, 24h expiry, `grant`, and the hex-encoded
/// session symmetric key (§4.C `encode_user_symmetric_key`).
pub fn issue_user_token(
    user_id: Uuid,
    grant: Grant,
    encoded_symmetric_key: String,
    key_material: &KeyMaterial,
) -> TokenResult<String> {
    let claims = UserClaims {
        sub: user_id,
        exp: (Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
        grant: grant.name().to_string(),
        user_symmetric_key: encoded_symmetric_key,
    };
    issue(&claims, key_material)
}

/// Issue a token for a machine (App) principal: no `sub`, the announced public half
/// hex instead of a symmetric key (§4.D).
pub fn issue_app_token(
    grant: Grant,
    encoded_pub_key: String,
    key_material: &KeyMaterial,
) -> TokenResult<String> {
    let claims = AppClaims {
        exp: (Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
        grant: grant.name().to_string(),
        encoded_pub_key,
    };
    issue(&claims, key_material)
}

fn issue<T: Serialize>(claims: &T, key_material: &KeyMaterial) -> TokenResult<String> {
    let compact_jws = jws::sign(claims, &key_material.jws_signing)?;
    let compact_jwe = jwe::encrypt(compact_jws.as_bytes(), &key_material.jwe_public)?;
    Ok(compact_jwe)
}

/// Parse and validate a compact JWE token envelope: decrypt, verify the inner
/// signature, assert `exp` is in the future, and resolve the grant name to a
/// [`Grant`] via the closed lookup (§4.D "authority-grant resolution").
///
/// Fails with a [`TokenError`] on any step — decrypt, signature verification, expiry,
/// or an unrecognized grant name — which callers map to `Error::AuthError` (§7).
pub fn parse_token(compact: &str, key_material: &KeyMaterial) -> TokenResult<ParsedToken> {
    let compact_jws_bytes = jwe::decrypt(compact, &key_material.jwe_private)?;
    let compact_jws = String::from_utf8_lossy(&compact_jws_bytes);

    let raw: serde_json::Value = jws::verify(&compact_jws, &key_material.jws_verifying)?;

    let now = Utc::now().timestamp();

    if raw.get("sub").is_some() {
        let claims: UserClaims = serde_json::from_value(raw)
            .map_err(|_| TokenError::UnrecognizedClaimsShape)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        let grant = Grant::from_name(&claims.grant)
            .ok_or_else(|| TokenError::UnknownGrant(claims.grant.clone()))?;
        Ok(ParsedToken::User { claims, grant })
    } else {
        let claims: AppClaims = serde_json::from_value(raw)
            .map_err(|_| TokenError::UnrecognizedClaimsShape)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        let grant = Grant::from_name(&claims.grant)
            .ok_or_else(|| TokenError::UnknownGrant(claims.grant.clone()))?;
        Ok(ParsedToken::App { claims, grant })
    }
}
