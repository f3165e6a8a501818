//! # Auth Engine (§4.D)
//!
//! Sign-up (first user, invited user), sign-in, token issuance/parsing, API-key
//! issuance, and authority-grant resolution, built on the JWS/JWE envelope defined in
//! `jws.rs`/`jwe.rs` and the claims/issuance glue in `token.rs`.

pub mod engine;
pub mod jwe;
pub mod jws;
pub mod keymaterial;
pub mod token;

pub use jwe::JweError;
pub use jws::JwsError;
pub use keymaterial::{KeyMaterial, KeyMaterialError};
pub use token::{parse_token, AppClaims, ParsedToken, UserClaims};
