//! Executable migration steps
//!
//! Migration code is compiled into the embedding binary and registered in
//! a [`MigrationRegistry`] keyed by the authored file name. The engine
//! loads steps through the [`StepLoader`] trait, so a different loading
//! strategy can be plugged in without touching the runner.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::Database;

use crate::error::{MigrateError, MigrateResult};
use crate::identifier::MigrationId;

/// One executable migration.
///
/// `up` receives the live database handle and reports failure through
/// `anyhow` so migration authors are free to use whatever error types the
/// work at hand produces.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Authored file name this step was compiled from.
    fn file_name(&self) -> &str;

    /// Apply the migration.
    async fn up(&self, db: &Database) -> anyhow::Result<()>;

    /// Reverse the migration. Scaffolded for authoring symmetry; the
    /// runner never invokes it.
    async fn down(&self, _db: &Database) -> anyhow::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("file_name", &self.file_name())
            .finish()
    }
}

/// Produces the executable step for a discovered migration.
pub trait StepLoader: Send + Sync {
    /// Whether a compiled step exists for this file name.
    fn contains(&self, file_name: &str) -> bool;

    /// Load the step for `id`. Fails with [`MigrateError::NoUpOperation`]
    /// when no up-capable step can be produced for it.
    fn load(&self, id: &MigrationId) -> MigrateResult<Arc<dyn MigrationStep>>;
}

/// Compiled-in table of migration steps, keyed by file name.
#[derive(Default)]
pub struct MigrationRegistry {
    steps: BTreeMap<String, Arc<dyn MigrationStep>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one step under its own `file_name()`. Last registration
    /// wins if a file name is registered twice.
    pub fn register(&mut self, step: impl MigrationStep + 'static) {
        self.steps
            .insert(step.file_name().to_string(), Arc::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl StepLoader for MigrationRegistry {
    fn contains(&self, file_name: &str) -> bool {
        self.steps.contains_key(file_name)
    }

    fn load(&self, id: &MigrationId) -> MigrateResult<Arc<dyn MigrationStep>> {
        self.steps
            .get(&id.file_name)
            .cloned()
            .ok_or_else(|| MigrateError::NoUpOperation {
                file_name: id.file_name.clone(),
            })
    }
}
