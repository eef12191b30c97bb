//! Persistence for registered domains and backup-run records.
//!
//! [`store::Store`] wraps a SeaORM connection (SQLite by default) and runs the
//! schema migrations on open. The incident state machine depends only on the
//! narrow [`BackupLogStore`] trait, which `Store` implements.

pub mod entities;
pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{Result, StorageError};
pub use store::Store;

use async_trait::async_trait;
use certguard_common::types::{AlertStatus, BackupRun, ConcludeBackupRun};

/// Backup-run persistence operations needed to make an alert decision.
///
/// Both write operations are compare-and-set on `alert_status`: they only
/// touch the row when its current alert status equals `expected`, and report
/// whether a row was written. This is what lets the state machine guarantee a
/// single winner for the `None -> *` transition without holding a lock while
/// mail is being sent.
#[async_trait]
pub trait BackupLogStore: Send + Sync {
    async fn get_backup_run(&self, id: i64) -> Result<Option<BackupRun>>;

    /// Writes `end_time`, `backup_status` and `alert_status` in one update,
    /// provided the stored alert status is still `expected`.
    async fn conclude_backup_run(
        &self,
        id: i64,
        update: &ConcludeBackupRun,
        alert_status: AlertStatus,
        expected: AlertStatus,
    ) -> Result<bool>;

    /// Moves `alert_status` from `from` to `to` if it still equals `from`.
    async fn transition_alert_status(
        &self,
        id: i64,
        from: AlertStatus,
        to: AlertStatus,
    ) -> Result<bool>;
}
