//! Stored payload record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The stored payload record (§3 "Log").
///
/// `ref_log_id` is set on client-facing copies created by
/// [`crate::logcrypt::LogCryptor::create_with_client_access`]; such rows point back at
/// the canonical log they were derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub id: Uuid,
    /// The double-encrypted stack trace: Client layer inner, Owner layer outer
    /// (§9 design note, adopted convention).
    pub double_encrypted_stack_trace: Vec<u8>,
    pub ref_log_id: Option<Uuid>,
}
