pub mod sqlite;
pub mod store;
pub mod transfer;

pub use sqlite::*;
pub use store::HistoryStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {id}")]
    NotFound { id: i64 },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Import rejected: {0}")]
    InvalidImport(String),

    #[error("Stored record is corrupted: {0}")]
    Corrupted(String),

    #[error("Nothing to save: generate at least one diagnosis or a summary first")]
    NothingToSave,

    #[error("Internal lock error")]
    LockPoisoned,
}
