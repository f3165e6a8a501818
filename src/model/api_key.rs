//! Machine credential.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A machine credential (§3 "ApiKey").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    /// Random, base64-alphabet, 32 characters.
    pub key: String,
    /// The Client-grant `Key` whose public half is announced in App tokens.
    pub encryption_key_id: Uuid,
}
