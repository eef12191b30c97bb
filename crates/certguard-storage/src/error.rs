/// Errors that can occur within the storage layer.
///
/// `NotFound`, `Duplicate` and `Conflict` are conditions the caller is expected to act on
/// (404 or 409); every other variant is a storage failure.
///
/// # Examples
///
/// ```rust
/// use certguard_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "backup_log",
///     id: "42".to_string(),
/// };
/// assert!(err.is_not_found());
/// assert!(err.to_string().contains("backup_log"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A unique key is already taken.
    #[error("Storage: {entity} '{key}' already exists")]
    Duplicate { entity: &'static str, key: String },

    /// A compare-and-set write kept losing to concurrent writers.
    #[error("Storage: write conflict on {entity} (id={id})")]
    Conflict { entity: &'static str, id: String },

    /// An underlying database error.
    #[error("Storage: database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A column held a value the domain types cannot represent.
    #[error("Storage: unexpected value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },

    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StorageError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
