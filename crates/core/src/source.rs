//! Migration source reader
//!
//! Lists authored migration files from the configured directory. Entries
//! that are not migration sources (subdirectories, foreign extensions) are
//! skipped; a file that claims to be a migration but cannot be parsed is
//! fatal, because a migration that cannot be ordered cannot be run safely.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, MigrateResult};
use crate::identifier::{MigrationId, MIGRATION_EXTENSION};
use crate::migration::StepLoader;

/// Reader over the authored migrations directory.
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parsed identifiers for every migration file in the directory, in
    /// discovery order (unsorted; the engine orders them).
    pub async fn list_candidates(&self) -> MigrateResult<Vec<MigrationId>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| MigrateError::DirectoryUnreadable {
            dir: self.dir.clone(),
            source: e,
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrateError::DirectoryUnreadable {
                dir: self.dir.clone(),
                source: e,
            })?;

            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path
                .extension()
                .map_or(true, |ext| ext != MIGRATION_EXTENSION)
            {
                continue;
            }

            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| MigrateError::InvalidFilename {
                    file_name: path.display().to_string(),
                })?;

            candidates.push(MigrationId::parse(file_name)?);
        }

        tracing::debug!(
            dir = %self.dir.display(),
            count = candidates.len(),
            "discovered migration sources"
        );
        Ok(candidates)
    }

    /// Check that every authored candidate has a compiled step behind it.
    ///
    /// An authored file with no registered step means the binary predates
    /// the file; running in that state would silently execute stale code.
    pub fn verify_compiled(
        &self,
        candidates: &[MigrationId],
        loader: &dyn StepLoader,
    ) -> MigrateResult<()> {
        for candidate in candidates {
            if !loader.contains(&candidate.file_name) {
                return Err(MigrateError::MissingCompiledArtifact {
                    file_name: candidate.file_name.clone(),
                    source_path: self.dir.join(&candidate.file_name),
                });
            }
        }
        Ok(())
    }
}
