//! Delegation state per (user, log).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a `PermissionRequest` (§3, §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Pending,
    Approved,
    Denied,
}

/// Delegation state per (user, log) (§3 "PermissionRequest").
///
/// Invariant: at most one request row per `log_id` at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: Uuid,
    pub log_id: Uuid,
    pub status: PermissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PermissionRequest {
    pub fn new(log_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            log_id,
            status: PermissionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
