use crate::BACKUP_FAILED_DESCRIPTION;
use certguard_common::types::{AlertStatus, BackupRun, BackupStatus, ConcludeBackupRun};
use certguard_notify::AlertDispatcher;
use certguard_storage::{BackupLogStore, StorageError};
use std::sync::Arc;

/// `alert_status` moves None -> SendFailed -> Sent at most once each, so a
/// compare-and-set can lose at most twice before the status is final.
const MAX_ATTEMPTS: usize = 3;

/// What the engine decided about alerting for one concluding update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// Not a new failure, or an alert decision was already taken for the run.
    NotRequired,
    Sent,
    SendFailed,
}

#[derive(Debug, Clone)]
pub struct IncidentOutcome {
    /// The run as persisted by this update.
    pub run: BackupRun,
    pub decision: AlertDecision,
}

/// Applies concluding updates to backup runs and raises at most one alert
/// per run.
///
/// The single-winner transition out of `AlertStatus::None` is a row-level
/// compare-and-set that also persists the new end time and status. The
/// winner claims the run as `SendFailed` before dispatching, so no lock is
/// held while mail is in flight and a crash mid-send can never leave `Sent`
/// behind for an alert that did not go out. A successful send then moves the
/// run from `SendFailed` to `Sent`.
pub struct IncidentEngine {
    store: Arc<dyn BackupLogStore>,
    dispatcher: Arc<dyn AlertDispatcher>,
}

impl IncidentEngine {
    pub fn new(store: Arc<dyn BackupLogStore>, dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Records the end of backup run `id`.
    ///
    /// # Errors
    ///
    /// `StorageError::NotFound` when no run has this id (nothing is created),
    /// `StorageError::Conflict` if concurrent writers keep invalidating the
    /// compare-and-set, or any underlying storage failure. Dispatch failures
    /// are not errors; they end up as [`AlertDecision::SendFailed`].
    pub async fn conclude(
        &self,
        id: i64,
        update: &ConcludeBackupRun,
    ) -> Result<IncidentOutcome, StorageError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let prior = self
                .store
                .get_backup_run(id)
                .await?
                .ok_or_else(|| StorageError::not_found("backup_log", id))?;

            // Only the prior alert status gates the decision; a run that was
            // already failed but never alerted still gets its one alert.
            let new_incident =
                update.backup_status == BackupStatus::Failed && !prior.alert_status.is_decided();

            if new_incident {
                let claimed = self
                    .store
                    .conclude_backup_run(id, update, AlertStatus::SendFailed, AlertStatus::None)
                    .await?;
                if !claimed {
                    tracing::debug!(id, attempt, "Alert claim lost to a concurrent update");
                    continue;
                }
                let decision = self.dispatch(&prior).await;
                let alert_status = match decision {
                    AlertDecision::Sent => AlertStatus::Sent,
                    _ => AlertStatus::SendFailed,
                };
                return Ok(IncidentOutcome {
                    run: concluded(prior, update, alert_status),
                    decision,
                });
            }

            let written = self
                .store
                .conclude_backup_run(id, update, prior.alert_status, prior.alert_status)
                .await?;
            if written {
                tracing::debug!(
                    id,
                    backup_status = ?update.backup_status,
                    alert_status = ?prior.alert_status,
                    "Backup run concluded without alert"
                );
                let alert_status = prior.alert_status;
                return Ok(IncidentOutcome {
                    run: concluded(prior, update, alert_status),
                    decision: AlertDecision::NotRequired,
                });
            }
            tracing::debug!(id, attempt, "Backup run changed underneath update, retrying");
        }

        Err(StorageError::Conflict {
            entity: "backup_log",
            id: id.to_string(),
        })
    }

    /// Sends the alert for a claimed run. The mail going out is what makes the
    /// decision `Sent`; recording it afterwards is best effort.
    async fn dispatch(&self, run: &BackupRun) -> AlertDecision {
        match self
            .dispatcher
            .send(&run.ip, &run.server_name, BACKUP_FAILED_DESCRIPTION)
            .await
        {
            Ok(()) => {
                tracing::info!(id = run.id, ip = %run.ip, server = %run.server_name, "Backup failure alert sent");
                match self
                    .store
                    .transition_alert_status(run.id, AlertStatus::SendFailed, AlertStatus::Sent)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(id = run.id, "Backup run vanished while its alert was sent");
                    }
                    Err(e) => {
                        tracing::error!(
                            id = run.id,
                            error = %e,
                            "Failed to record sent alert, run stays at SEND_FAILED"
                        );
                    }
                }
                AlertDecision::Sent
            }
            Err(e) => {
                tracing::warn!(
                    id = run.id,
                    ip = %run.ip,
                    server = %run.server_name,
                    error = %e,
                    "Backup failure alert not sent"
                );
                AlertDecision::SendFailed
            }
        }
    }
}

fn concluded(prior: BackupRun, update: &ConcludeBackupRun, alert_status: AlertStatus) -> BackupRun {
    BackupRun {
        end_time: update.end_time,
        backup_status: update.backup_status,
        alert_status,
        ..prior
    }
}
