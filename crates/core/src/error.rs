//! Error types for the migration engine
//!
//! Every failure mode a run can hit is a distinct variant so callers can
//! match on the kind instead of inspecting message text.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error type for the migration engine
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("invalid migration filename '{file_name}': expected <sortkey>.<label>.rs")]
    InvalidFilename { file_name: String },

    #[error(
        "migration '{file_name}' (authored at {}) has no compiled step registered; \
         rebuild the binary or register the migration",
        source_path.display()
    )]
    MissingCompiledArtifact {
        file_name: String,
        source_path: PathBuf,
    },

    #[error("cannot read migrations directory {}: {source}", dir.display())]
    DirectoryUnreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("migration '{file_name}' is already recorded in the changelog")]
    DuplicateRecord { file_name: String },

    #[error("migration '{file_name}' exposes no up operation")]
    NoUpOperation { file_name: String },

    #[error("migration '{file_name}' failed: {source}")]
    Execution {
        file_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("migration name is required")]
    MissingMigrationName,

    #[error("cannot write migration file {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}
