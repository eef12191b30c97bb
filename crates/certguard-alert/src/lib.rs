//! Backup incident alerting.
//!
//! [`engine::IncidentEngine`] applies the concluding update of a backup run
//! and decides, at most once per run, whether a failure alert is sent. The
//! decision is recorded on the run itself (`alert_status`), so it is never
//! repeated for the same record.

pub mod engine;


/// Description attached to every backup-failure alert.
pub const BACKUP_FAILED_DESCRIPTION: &str = "backup execution failed";
