use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, SqlErr};
use std::path::Path;

use crate::error::{Result, StorageError};

pub mod backup;
pub mod domain;

/// Unified access layer over the certguard database.
///
/// All methods are `async fn` on top of SeaORM. Cloning is cheap: the
/// underlying connection is a pool.
#[derive(Clone)]
pub struct Store {
    pub(crate) db: DatabaseConnection,
}

impl Store {
    /// Connects to the database and brings the schema up to date.
    ///
    /// - `db_url`: full connection URL supplied by the server config, e.g.
    ///   `sqlite:///var/lib/certguard/certguard.db?mode=rwc`.
    /// - `data_dir`: local data directory, created if missing.
    pub async fn new(db_url: &str, data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db = Database::connect(db_url).await?;

        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;
        tracing::info!(db_url = %db_url, "Initialized store");

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Maps a unique-constraint violation onto [`StorageError::Duplicate`].
pub(crate) fn map_insert_err(err: DbErr, entity: &'static str, key: &str) -> StorageError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StorageError::Duplicate {
            entity,
            key: key.to_string(),
        },
        _ => StorageError::Database(err),
    }
}
