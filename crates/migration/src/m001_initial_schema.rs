use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS domains (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    domain_name TEXT NOT NULL UNIQUE,
    notification_email TEXT NOT NULL DEFAULT '',
    certificate_status TEXT NOT NULL DEFAULT 'ERROR',
    certificate_issuer TEXT NOT NULL DEFAULT '',
    certificate_expiry TEXT,
    last_checked TEXT,
    auto_renewal INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_domains_status ON domains(certificate_status);

CREATE TABLE IF NOT EXISTS backup_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    ip TEXT NOT NULL,
    server_name TEXT NOT NULL,
    start_time TEXT,
    end_time TEXT,
    backup_status INTEGER NOT NULL DEFAULT 0,
    alert_status INTEGER NOT NULL DEFAULT 0,
    script_version TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_backup_logs_ip ON backup_logs(ip, id DESC);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS backup_logs;
DROP TABLE IF EXISTS domains;
";
