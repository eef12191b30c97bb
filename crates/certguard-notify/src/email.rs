use crate::error::{NotifyError, Result};
use crate::AlertDispatcher;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ALERT_SUBJECT: &str = "Backup failure alert";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS (SMTPS, usually port 465).
    Tls,
    #[default]
    Starttls,
    /// Plaintext. Only for local relays.
    None,
}

/// `[email]` section of the server config.
///
/// An empty `smtp_host` switches mail off: every dispatch then fails with
/// [`NotifyError::NotConfigured`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_security: SmtpSecurity,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_addresses: Vec<String>,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_security: SmtpSecurity::default(),
            username: None,
            password: None,
            from_address: String::new(),
            to_addresses: Vec::new(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_send_timeout_secs() -> u64 {
    30
}

/// Sends backup-failure alerts to a fixed recipient list over SMTP.
pub struct EmailDispatcher<T = AsyncSmtpTransport<Tokio1Executor>> {
    transport: Option<T>,
    from: Option<Mailbox>,
    to: Vec<Mailbox>,
}

impl EmailDispatcher {
    /// Builds an SMTP dispatcher from config.
    ///
    /// With an empty `smtp_host` no transport is created and the dispatcher
    /// reports every send as not configured.
    pub fn from_config(cfg: &EmailConfig) -> Result<Self> {
        if cfg.smtp_host.trim().is_empty() {
            tracing::warn!("Email alerts disabled: smtp_host is empty");
            return Ok(Self {
                transport: None,
                from: None,
                to: Vec::new(),
            });
        }

        let host = cfg.smtp_host.trim();
        let mut builder = match cfg.smtp_security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| NotifyError::SmtpError(e.to_string()))?,
            SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::SmtpError(e.to_string()))?,
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        }
        .port(cfg.smtp_port)
        .timeout(Some(Duration::from_secs(cfg.send_timeout_secs)));

        if let (Some(user), Some(pass)) = (cfg.username.as_deref(), cfg.password.as_deref()) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        tracing::info!(
            smtp_host = %host,
            smtp_port = cfg.smtp_port,
            recipients = cfg.to_addresses.len(),
            "Email alerts enabled"
        );
        Self::with_transport(cfg, builder.build())
    }
}

impl<T> EmailDispatcher<T> {
    /// Builds a dispatcher around an already constructed transport. The
    /// config still decides whether mail is switched on.
    pub fn with_transport(cfg: &EmailConfig, transport: T) -> Result<Self> {
        let from = match cfg.from_address.trim() {
            "" => None,
            addr => Some(parse_mailbox(addr)?),
        };
        let to = cfg
            .to_addresses
            .iter()
            .map(|addr| parse_mailbox(addr.trim()))
            .collect::<Result<Vec<_>>>()?;
        let transport = if cfg.smtp_host.trim().is_empty() {
            None
        } else {
            Some(transport)
        };
        Ok(Self {
            transport,
            from,
            to,
        })
    }

    pub fn recipients(&self) -> &[Mailbox] {
        &self.to
    }

    fn build_message(&self, from: &Mailbox, host_ip: &str, server_name: &str, error: &str) -> Result<Message> {
        let mut builder = Message::builder()
            .from(from.clone())
            .subject(ALERT_SUBJECT)
            .header(ContentType::TEXT_PLAIN);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        Ok(builder.body(format_body(host_ip, server_name, error))?)
    }
}

#[async_trait]
impl<T> AlertDispatcher for EmailDispatcher<T>
where
    T: AsyncTransport + Send + Sync,
    T::Error: std::fmt::Display,
{
    async fn send(&self, host_ip: &str, server_name: &str, error: &str) -> Result<()> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(NotifyError::NotConfigured("smtp_host is empty"))?;
        let from = self
            .from
            .as_ref()
            .ok_or(NotifyError::NotConfigured("from_address is empty"))?;
        if self.to.is_empty() {
            return Err(NotifyError::NotConfigured("to_addresses is empty"));
        }

        let message = self.build_message(from, host_ip, server_name, error)?;
        if let Err(e) = transport.send(message).await {
            tracing::error!(host_ip, server_name, error = %e, "Alert email send failed");
            return Err(NotifyError::SmtpError(e.to_string()));
        }

        tracing::info!(
            host_ip,
            server_name,
            recipients = self.to.len(),
            "Alert email sent"
        );
        Ok(())
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress {
            address: addr.to_string(),
            reason: e.to_string(),
        })
}

fn format_body(host_ip: &str, server_name: &str, error: &str) -> String {
    format!(
        "Server backup failure alert:\n\n\
         IP address: {host_ip}\n\
         Server name: {server_name}\n\
         Error: {error}\n\n\
         Please check and handle it promptly.\n\n\
         This message was sent automatically, please do not reply.\n"
    )
}
