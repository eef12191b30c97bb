//! Delivery of backup-failure alerts.
//!
//! The incident state machine only needs to know whether a notification went
//! out; [`AlertDispatcher`] is that seam. [`email::EmailDispatcher`] is the
//! SMTP implementation.

pub mod email;
pub mod error;

pub use email::{EmailConfig, EmailDispatcher, SmtpSecurity};
pub use error::NotifyError;

use async_trait::async_trait;

/// Sends a single alert about a failed backup.
///
/// Implementations make exactly one delivery attempt. Misconfiguration and
/// transport failures are both returned as errors so the caller can record
/// the outcome; nothing here retries or queues.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn send(&self, host_ip: &str, server_name: &str, error: &str) -> error::Result<()>;
}
