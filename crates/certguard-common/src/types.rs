use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Certificate health of a registered domain, as of its latest probe.
///
/// # Examples
///
/// ```
/// use certguard_common::types::CertificateStatus;
///
/// assert_eq!(CertificateStatus::from_valid(true), CertificateStatus::Valid);
/// assert_eq!(CertificateStatus::Error.to_string(), "ERROR");
/// assert_eq!("VALID".parse::<CertificateStatus>(), Ok(CertificateStatus::Valid));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CertificateStatus {
    Valid,
    Error,
}

impl CertificateStatus {
    pub fn from_valid(is_valid: bool) -> Self {
        if is_valid {
            CertificateStatus::Valid
        } else {
            CertificateStatus::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Valid => "VALID",
            CertificateStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CertificateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VALID" => Ok(CertificateStatus::Valid),
            "ERROR" => Ok(CertificateStatus::Error),
            _ => Err(format!("unknown certificate status: {s}")),
        }
    }
}

/// Final outcome of a backup run. Encoded as an integer on the wire and in
/// storage (`0` = ok, `1` = failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum BackupStatus {
    #[default]
    Ok,
    Failed,
}

impl TryFrom<i32> for BackupStatus {
    type Error = String;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(BackupStatus::Ok),
            1 => Ok(BackupStatus::Failed),
            _ => Err(format!("unknown backup status: {v}")),
        }
    }
}

impl From<BackupStatus> for i32 {
    fn from(s: BackupStatus) -> i32 {
        match s {
            BackupStatus::Ok => 0,
            BackupStatus::Failed => 1,
        }
    }
}

/// Alert sub-state of a backup run.
///
/// `None` is the only state an alert decision can be taken from. Once a run
/// leaves it, the only further move is `SendFailed` to `Sent` after a
/// successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum AlertStatus {
    #[default]
    None,
    Sent,
    SendFailed,
}

impl AlertStatus {
    /// Whether an alert decision has already been taken for the run.
    pub fn is_decided(&self) -> bool {
        !matches!(self, AlertStatus::None)
    }
}

impl TryFrom<i32> for AlertStatus {
    type Error = String;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(AlertStatus::None),
            1 => Ok(AlertStatus::Sent),
            2 => Ok(AlertStatus::SendFailed),
            _ => Err(format!("unknown alert status: {v}")),
        }
    }
}

impl From<AlertStatus> for i32 {
    fn from(s: AlertStatus) -> i32 {
        match s {
            AlertStatus::None => 0,
            AlertStatus::Sent => 1,
            AlertStatus::SendFailed => 2,
        }
    }
}

/// Outcome of a single certificate probe.
///
/// Connection failures are reported here rather than as an error: such a
/// verdict has `is_valid == false`, an empty issuer, no validity window and a
/// single `"connection failed: ..."` entry in `validation_errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateVerdict {
    /// The `host:port` address that was probed.
    pub domain: String,
    pub issuer: String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub remaining_days: i64,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

impl CertificateVerdict {
    pub fn connection_failed(domain: &str, detail: impl std::fmt::Display) -> Self {
        Self {
            domain: domain.to_string(),
            issuer: String::new(),
            not_before: None,
            not_after: None,
            remaining_days: 0,
            is_valid: false,
            validation_errors: vec![format!("connection failed: {detail}")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: i64,
    pub domain_name: String,
    pub notification_email: String,
    pub certificate_status: CertificateStatus,
    pub certificate_issuer: String,
    pub certificate_expiry: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
    pub auto_renewal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRun {
    pub id: i64,
    pub ip: String,
    pub server_name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub backup_status: BackupStatus,
    pub alert_status: AlertStatus,
    pub script_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BackupRun {
    /// A run without an end time is still in progress.
    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Rejections produced while validating inbound request bodies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("invalid domain name '{0}'")]
    InvalidDomain(String),

    #[error("invalid email address '{0}'")]
    InvalidEmail(String),

    #[error("invalid {field} '{value}': expected RFC 3339 or 'YYYY-MM-DD HH:MM:SS'")]
    InvalidTimestamp { field: &'static str, value: String },
}

// ---- Domains ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDomainRequest {
    pub domain_name: String,
    #[serde(default)]
    pub notification_email: Option<String>,
    #[serde(default)]
    pub auto_renewal: Option<bool>,
}

/// A validated domain registration, not yet probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDomain {
    pub domain_name: String,
    pub notification_email: String,
    pub auto_renewal: bool,
}

impl CreateDomainRequest {
    pub fn validate(self) -> Result<NewDomain, ValidationError> {
        let domain_name = validate_domain_name(&self.domain_name)?;
        let notification_email = validate_email(self.notification_email.as_deref())?;
        Ok(NewDomain {
            domain_name,
            notification_email,
            auto_renewal: self.auto_renewal.unwrap_or(true),
        })
    }
}

impl NewDomain {
    /// Builds the record that will be persisted once the first verdict has
    /// been folded into it. The id is assigned by storage.
    pub fn into_record(self, now: DateTime<Utc>) -> DomainRecord {
        DomainRecord {
            id: 0,
            domain_name: self.domain_name,
            notification_email: self.notification_email,
            certificate_status: CertificateStatus::Error,
            certificate_issuer: String::new(),
            certificate_expiry: None,
            last_checked: None,
            auto_renewal: self.auto_renewal,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Manual edit of a domain. Only the fields a user owns are accepted; the
/// certificate fields belong to the status reducer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDomainRequest {
    #[serde(default)]
    pub notification_email: Option<String>,
    #[serde(default)]
    pub auto_renewal: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSettings {
    pub notification_email: Option<String>,
    pub auto_renewal: Option<bool>,
}

impl UpdateDomainRequest {
    pub fn validate(self) -> Result<DomainSettings, ValidationError> {
        let notification_email = match self.notification_email {
            Some(email) => Some(validate_email(Some(&email))?),
            None => None,
        };
        Ok(DomainSettings {
            notification_email,
            auto_renewal: self.auto_renewal,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDomainRequest {
    pub domain: String,
}

// ---- Backup runs ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBackupRunRequest {
    pub ip: String,
    pub server_name: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub backup_status: Option<BackupStatus>,
    #[serde(default)]
    pub script_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBackupRun {
    pub ip: String,
    pub server_name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub backup_status: BackupStatus,
    pub script_version: String,
}

impl CreateBackupRunRequest {
    pub fn validate(self) -> Result<NewBackupRun, ValidationError> {
        let ip = self.ip.trim();
        if ip.is_empty() {
            return Err(ValidationError::Empty("ip"));
        }
        let server_name = self.server_name.trim();
        if server_name.is_empty() {
            return Err(ValidationError::Empty("server_name"));
        }
        let start_time = match self.start_time.as_deref() {
            Some(raw) => parse_agent_timestamp("start_time", raw)?,
            None => None,
        };
        let script_version = self
            .script_version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "0".to_string());
        Ok(NewBackupRun {
            ip: ip.to_string(),
            server_name: server_name.to_string(),
            start_time,
            backup_status: self.backup_status.unwrap_or_default(),
            script_version,
        })
    }
}

/// Body of the update an agent sends when a backup run finishes.
///
/// Identifying fields (ip, server name, start time, script version) and the
/// alert status are deliberately absent: the former are immutable after
/// create, the latter is owned by the incident state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcludeBackupRunRequest {
    #[serde(default)]
    pub end_time: Option<String>,
    pub backup_status: BackupStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcludeBackupRun {
    pub end_time: Option<DateTime<Utc>>,
    pub backup_status: BackupStatus,
}

impl ConcludeBackupRunRequest {
    pub fn validate(self) -> Result<ConcludeBackupRun, ValidationError> {
        let end_time = match self.end_time.as_deref() {
            Some(raw) => parse_agent_timestamp("end_time", raw)?,
            None => None,
        };
        Ok(ConcludeBackupRun {
            end_time,
            backup_status: self.backup_status,
        })
    }
}

/// Parses a timestamp reported by a backup agent.
///
/// Agents send either RFC 3339 or a bare `YYYY-MM-DD HH:MM:SS`, which is taken
/// as UTC. An empty string means the field is absent.
///
/// # Examples
///
/// ```
/// use certguard_common::types::parse_agent_timestamp;
///
/// let ts = parse_agent_timestamp("end_time", "2024-03-01 02:30:00").unwrap().unwrap();
/// assert_eq!(ts.to_rfc3339(), "2024-03-01T02:30:00+00:00");
/// assert_eq!(parse_agent_timestamp("end_time", "  ").unwrap(), None);
/// assert!(parse_agent_timestamp("end_time", "yesterday").is_err());
/// ```
pub fn parse_agent_timestamp(
    field: &'static str,
    raw: &str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| Some(naive.and_utc()))
        .map_err(|_| ValidationError::InvalidTimestamp {
            field,
            value: raw.to_string(),
        })
}

fn validate_domain_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::Empty("domain_name"));
    }
    if name.contains("://") || name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidDomain(name.to_string()));
    }
    Ok(name.to_lowercase())
}

fn validate_email(raw: Option<&str>) -> Result<String, ValidationError> {
    let email = raw.unwrap_or_default().trim();
    if email.is_empty() {
        return Ok(String::new());
    }
    email
        .parse::<lettre::Address>()
        .map(|_| email.to_string())
        .map_err(|_| ValidationError::InvalidEmail(email.to_string()))
}
