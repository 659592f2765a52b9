use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("store busy after {attempts} attempts")]
    Busy { attempts: u32 },

    #[error("write abandoned: deadline exceeded")]
    DeadlineExceeded,

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store schema version {found} is newer than this build supports ({supported})")]
    SchemaTooNew { found: usize, supported: usize },

    #[error("store is configured as encrypted but no key is available")]
    KeyMissing,

    #[error("store is configured as encrypted but this build has no encryption support")]
    EncryptionUnavailable,

    #[error("encryption key rejected by store")]
    WrongKey,

    #[error("{0} not found")]
    NotFound(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        let constraint = match &err {
            rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
                Some(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => None,
        };
        match constraint {
            Some(message) => StorageError::Constraint(message),
            None => StorageError::Database(err),
        }
    }
}

impl StorageError {
    /// Another connection holds the write lock; worth retrying
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            StorageError::Database(rusqlite::Error::SqliteFailure(e, _))
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }

    /// The file is not a readable database (wrong key, or not SQLite at all)
    pub fn is_not_a_database(&self) -> bool {
        matches!(
            self,
            StorageError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::NotADatabase
        )
    }
}
