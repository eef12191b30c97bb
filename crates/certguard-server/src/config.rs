use anyhow::Context;
use certguard_notify::EmailConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cert_check: CertCheckConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            bind_addr: default_bind_addr(),
            cors_allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
            cert_check: CertCheckConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full SeaORM URL. When unset a SQLite file inside `data_dir` is used.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => {
                let path = Path::new(&self.data_dir).join("certguard.db");
                format!("sqlite://{}?mode=rwc", path.display())
            }
        }
    }

    /// Connection URL with any password replaced, for logging.
    pub fn redacted_url(&self) -> String {
        let url = self.connection_url();
        let Some((scheme, rest)) = url.split_once("://") else {
            return url;
        };
        match rest.split_once('@') {
            Some((userinfo, host)) => {
                let user = userinfo.split(':').next().unwrap_or_default();
                format!("{scheme}://{user}:***@{host}")
            }
            None => url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertCheckConfig {
    /// Bound on TCP connect and on the TLS handshake, each.
    #[serde(default = "default_cert_check_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Probes run in parallel by a bulk check.
    #[serde(default = "default_cert_check_max_concurrent")]
    pub max_concurrent: usize,
    /// Host name to socket address overrides. SNI still carries the host name.
    #[serde(default)]
    pub resolve: HashMap<String, SocketAddr>,
}

impl Default for CertCheckConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_cert_check_connect_timeout_secs(),
            max_concurrent: default_cert_check_max_concurrent(),
            resolve: HashMap::new(),
        }
    }
}

fn default_cert_check_connect_timeout_secs() -> u64 {
    10
}

fn default_cert_check_max_concurrent() -> usize {
    10
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        Ok(config)
    }
}
