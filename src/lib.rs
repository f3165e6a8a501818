//! # sharelog-core
//!
//! The cryptographic key-hierarchy and access-delegation engine behind a confidential
//! log-ingestion service. Client applications submit logs encrypted under a publicly
//! advertised "client" key; this crate wraps them again under an "owner" key before
//! they are persisted, so the at-rest payload is readable only by a principal holding
//! both private keys. Access to individual logs can later be delegated from an
//! owner-tier principal to a client-tier principal through a permission-request
//! workflow that mints and hands out a freshly-generated shared key.
//!
//! ## Modules
//!
//! - `model`: the data model — `Grant`, `Key`, `User`, `Invite`, `ApiKey`,
//!   `PermissionRequest`, `Log`.
//! - `crypto`: symmetric wrap/unwrap primitives, ECIES, key derivation, and the
//!   session-key codec.
//! - `vault`: the Key Vault — the `Key` storage contract and its query predicates.
//! - `keyring`: the Key Manager — session-key derivation, key creation/unwrap,
//!   invite key-set assembly, shared-key acquisition.
//! - `auth`: the Auth Engine — sign-up, sign-in, invite issuance, and the nested
//!   JWS/JWE token envelope.
//! - `permission`: the Permission Machine — the delegation state machine and
//!   shared-key template minting.
//! - `logcrypt`: the Log Cryptor — envelope encryption at ingestion and layered
//!   decryption on retrieval.
//! - `storage` / `mailer`: the storage and mail-delivery contracts this crate depends
//!   on but does not implement.
//! - `config` / `error`: process-wide configuration and the unified error type.
//!
//! HTTP routing, request binding, durable storage backends, and email delivery are
//! external collaborators; this crate defines only the contracts (traits) they must
//! satisfy.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keyring;
pub mod logcrypt;
pub mod mailer;
pub mod model;
pub mod permission;
pub mod storage;
pub mod vault;

pub use error::{Error, ErrorKind, Result};

/// Crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, as declared in `Cargo.toml`.
pub const NAME: &str = env!("CARGO_PKG_NAME");
