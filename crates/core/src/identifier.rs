//! Migration filename codec
//!
//! A migration file is named `<sortkey>.<label>.rs`, e.g.
//! `20240315_104500.add-user-indexes.rs`. The sort key is a
//! lexicographically sortable timestamp token, so plain string ordering of
//! file names is chronological ordering of migrations.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MigrateError, MigrateResult};

/// Extension migration source files carry.
pub const MIGRATION_EXTENSION: &str = "rs";

static FILENAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\.([\w-]+)\.rs$").expect("migration filename pattern"));

/// Parsed identity of one migration file.
///
/// Constructed transiently from a directory listing or lookup; only
/// `file_name` is ever persisted to the changelog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationId {
    /// Full file name, the persisted identity of the migration
    pub file_name: String,
    /// Sortable timestamp token (`YYYYMMDD_HHmmss` as scaffolded)
    pub sort_key: String,
    /// Human-readable slug
    pub label: String,
}

impl MigrationId {
    /// Parse a migration file name into its identity.
    ///
    /// Fails with [`MigrateError::InvalidFilename`] when the name does not
    /// match `<sortkey>.<label>.rs`. A file that cannot be parsed cannot be
    /// ordered, so callers on the reconciliation path treat this as fatal.
    pub fn parse(file_name: &str) -> MigrateResult<Self> {
        let captures =
            FILENAME_PATTERN
                .captures(file_name)
                .ok_or_else(|| MigrateError::InvalidFilename {
                    file_name: file_name.to_string(),
                })?;

        Ok(Self {
            file_name: file_name.to_string(),
            sort_key: captures[1].to_string(),
            label: captures[2].to_string(),
        })
    }
}

impl std::fmt::Display for MigrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name)
    }
}
