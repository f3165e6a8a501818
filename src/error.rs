//! Crate-wide error type.
//!
//! Every component module defines its own `thiserror` enum with enough context for
//! operators; this module unifies them behind one propagation type and attaches the
//! abstract error kind from the system's error-handling design (see `ErrorKind`), which
//! an HTTP collaborator can map to status codes without reaching into module internals.

use thiserror::Error;

use crate::auth::{JweError, JwsError};
use crate::config::ConfigError;
use crate::crypto::asymmetric::AsymmetricError;
use crate::crypto::wrap::CryptoError as PrimitiveCryptoError;

/// The abstract error kinds from the system's error-handling design.
///
/// These are not exposed as Rust types directly (each module keeps its own typed
/// error enum); `Error::kind` classifies any crate error into one of these so that the
/// (out-of-scope) HTTP layer can map it to a status code without matching on every
/// concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Password or invite code mismatch. Maps to 403 with a non-informative message.
    BadCredentials,
    /// Invite id absent or code wrong. Maps to 400/403.
    BadInvite,
    /// Token decrypt/verify/expiry failure. Maps to 401.
    AuthError,
    /// Grant-level insufficient, or log access check failed. Maps to 403.
    Forbidden,
    /// Unwrap, decrypt, derive, or RNG failure. Maps to 500.
    CryptoError,
    /// Storage query returned empty for a required lookup. Maps to 404.
    NotFound,
    /// Uniqueness violation. Maps to 409.
    Conflict,
}

/// Unified crate error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("bad credentials")]
    BadCredentials,

    #[error("bad invite: {0}")]
    BadInvite(String),

    #[error("auth error: {0}")]
    AuthError(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Classify this error into one of the abstract kinds of the error-handling design.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadCredentials => ErrorKind::BadCredentials,
            Error::BadInvite(_) => ErrorKind::BadInvite,
            Error::AuthError(_) => ErrorKind::AuthError,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Crypto(_) => ErrorKind::CryptoError,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Config(_) => ErrorKind::CryptoError,
        }
    }
}

impl From<PrimitiveCryptoError> for Error {
    fn from(e: PrimitiveCryptoError) -> Self {
        Error::Crypto(e.to_string())
    }
}

impl From<AsymmetricError> for Error {
    fn from(e: AsymmetricError) -> Self {
        Error::Crypto(e.to_string())
    }
}

impl From<JwsError> for Error {
    fn from(e: JwsError) -> Self {
        Error::AuthError(e.to_string())
    }
}

impl From<JweError> for Error {
    fn from(e: JweError) -> Self {
        Error::AuthError(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
