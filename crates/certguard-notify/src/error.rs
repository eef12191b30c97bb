/// Errors that can occur while dispatching an alert.
///
/// # Examples
///
/// ```rust
/// use certguard_notify::error::NotifyError;
///
/// let err = NotifyError::NotConfigured("smtp_host is empty");
/// assert!(err.to_string().contains("smtp_host"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Mail delivery is switched off or incomplete. This is a configured
    /// state, not a transient fault.
    #[error("Notify: mail transport not configured: {0}")]
    NotConfigured(&'static str),

    /// A configured address could not be parsed.
    #[error("Notify: invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Building the message failed.
    #[error("Notify: failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    /// SMTP transport error when sending email.
    #[error("Notify: SMTP error: {0}")]
    SmtpError(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
