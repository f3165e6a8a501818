//! # Mailer contract (§10.I)
//!
//! Out-of-band invite-code delivery is an external collaborator (§1); this crate
//! defines only the trait boundary. No concrete backend (SMTP, provider API) ships
//! here.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailerError {
    #[error("failed to deliver message to {to}: {reason}")]
    DeliveryFailed { to: String, reason: String },
}

/// Out-of-band code delivery, used by the Auth Engine's "create invite" operation
/// (§4.D) to hand the invite code to the inviter's chosen recipient.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_invite_code(&self, to: &str, code: &str) -> Result<(), MailerError>;
}
