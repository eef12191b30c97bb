use async_trait::async_trait;
use certguard_common::types::{AlertStatus, BackupRun, BackupStatus, ConcludeBackupRun, NewBackupRun};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::backup_log::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::Store;
use crate::BackupLogStore;

fn to_run(m: backup_log::Model) -> Result<BackupRun> {
    let backup_status = BackupStatus::try_from(m.backup_status).map_err(|_| StorageError::Corrupt {
        column: "backup_status",
        value: m.backup_status.to_string(),
    })?;
    let alert_status = AlertStatus::try_from(m.alert_status).map_err(|_| StorageError::Corrupt {
        column: "alert_status",
        value: m.alert_status.to_string(),
    })?;
    Ok(BackupRun {
        id: m.id,
        ip: m.ip,
        server_name: m.server_name,
        start_time: m.start_time.map(|t| t.with_timezone(&Utc)),
        end_time: m.end_time.map(|t| t.with_timezone(&Utc)),
        backup_status,
        alert_status,
        script_version: m.script_version,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl Store {
    /// All backup runs, newest first.
    pub async fn list_backup_runs(&self) -> Result<Vec<BackupRun>> {
        let rows = Entity::find()
            .order_by_desc(Column::Id)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_run).collect()
    }

    /// Records the start of a backup run. New runs never carry an alert.
    pub async fn insert_backup_run(&self, run: &NewBackupRun) -> Result<BackupRun> {
        let now = Utc::now().fixed_offset();
        let am = backup_log::ActiveModel {
            ip: Set(run.ip.clone()),
            server_name: Set(run.server_name.clone()),
            start_time: Set(run.start_time.map(|t| t.fixed_offset())),
            end_time: Set(None),
            backup_status: Set(i32::from(run.backup_status)),
            alert_status: Set(i32::from(AlertStatus::None)),
            script_version: Set(run.script_version.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = am.insert(self.db()).await?;
        to_run(model)
    }

    pub async fn find_backup_run(&self, id: i64) -> Result<Option<BackupRun>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_run).transpose()
    }

    /// The most recent run reported from `ip`.
    pub async fn latest_backup_run_by_ip(&self, ip: &str) -> Result<Option<BackupRun>> {
        let model = Entity::find()
            .filter(Column::Ip.eq(ip))
            .order_by_desc(Column::Id)
            .one(self.db())
            .await?;
        model.map(to_run).transpose()
    }

    pub async fn delete_backup_run(&self, id: i64) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}

#[async_trait]
impl BackupLogStore for Store {
    async fn get_backup_run(&self, id: i64) -> Result<Option<BackupRun>> {
        self.find_backup_run(id).await
    }

    async fn conclude_backup_run(
        &self,
        id: i64,
        update: &ConcludeBackupRun,
        alert_status: AlertStatus,
        expected: AlertStatus,
    ) -> Result<bool> {
        let am = backup_log::ActiveModel {
            end_time: Set(update.end_time.map(|t| t.fixed_offset())),
            backup_status: Set(i32::from(update.backup_status)),
            alert_status: Set(i32::from(alert_status)),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        };
        let res = Entity::update_many()
            .set(am)
            .filter(Column::Id.eq(id))
            .filter(Column::AlertStatus.eq(i32::from(expected)))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn transition_alert_status(
        &self,
        id: i64,
        from: AlertStatus,
        to: AlertStatus,
    ) -> Result<bool> {
        let am = backup_log::ActiveModel {
            alert_status: Set(i32::from(to)),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        };
        let res = Entity::update_many()
            .set(am)
            .filter(Column::Id.eq(id))
            .filter(Column::AlertStatus.eq(i32::from(from)))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }
}
