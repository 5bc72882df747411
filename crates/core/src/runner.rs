//! Reconciliation engine
//!
//! Computes the set difference between migrations on disk and migrations
//! recorded in the changelog, orders the delta, and executes it strictly
//! sequentially, committing the changelog after every step. A run killed
//! between two migrations resumes at exactly the first unrecorded one.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use mongodb::Database;
use serde::Serialize;

use crate::error::{MigrateError, MigrateResult};
use crate::identifier::MigrationId;
use crate::migration::StepLoader;
use crate::source::MigrationSource;
use crate::store::AppliedSet;

/// Outcome of one `up` run.
#[derive(Debug)]
pub struct RunReport {
    /// File names applied and committed this run, in execution order
    pub applied: Vec<String>,
    /// Migrations that were already recorded before the run started
    pub already_applied: usize,
    /// Most recently applied migration on record before this run
    /// (lexicographic max of recorded ids)
    pub latest_applied: Option<String>,
    /// Wall-clock duration of the run
    pub execution_time_ms: u128,
}

/// Applied/pending state of one discovered migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationState {
    pub file_name: String,
    /// When the migration was recorded, `None` while pending
    pub applied_at: Option<DateTime<Utc>>,
}

/// The migration runner. Holds the discovery source, the step loader, the
/// changelog store, and the shared database handle for the whole run.
pub struct Reconciler<'a> {
    source: MigrationSource,
    loader: &'a dyn StepLoader,
    store: &'a dyn AppliedSet,
    database: &'a Database,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        source: MigrationSource,
        loader: &'a dyn StepLoader,
        store: &'a dyn AppliedSet,
        database: &'a Database,
    ) -> Self {
        Self {
            source,
            loader,
            store,
            database,
        }
    }

    /// Apply every pending migration, oldest first.
    ///
    /// Any failure aborts the run immediately: migrations before the
    /// failing one are recorded, the failing one and everything after it
    /// are not.
    pub async fn up(&self) -> MigrateResult<RunReport> {
        let start = Instant::now();

        // The two discovery reads touch different resources and carry no
        // ordering dependency; everything after them is sequential.
        let (candidates, applied) =
            tokio::try_join!(self.source.list_candidates(), self.store.list_applied())?;

        self.source.verify_compiled(&candidates, self.loader)?;

        let applied_names: HashSet<&str> =
            applied.iter().map(|a| a.file_name.as_str()).collect();
        let latest_applied = applied.iter().map(|a| a.file_name.clone()).max();

        let mut pending: Vec<MigrationId> = candidates
            .into_iter()
            .filter(|candidate| !applied_names.contains(candidate.file_name.as_str()))
            .collect();

        if pending.is_empty() {
            tracing::info!(
                latest = latest_applied.as_deref().unwrap_or("none"),
                "changelog is up to date, nothing to apply"
            );
            return Ok(RunReport {
                applied: Vec::new(),
                already_applied: applied.len(),
                latest_applied,
                execution_time_ms: start.elapsed().as_millis(),
            });
        }

        // Lexicographic order on file names is chronological order by
        // sort-key construction. Later migrations may depend on effects of
        // earlier ones: oldest first, never in parallel.
        pending.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let mut applied_this_run = Vec::new();
        for id in &pending {
            let step = self.loader.load(id)?;

            tracing::info!(migration = %id, "applying migration");
            step.up(self.database)
                .await
                .map_err(|source| MigrateError::Execution {
                    file_name: id.file_name.clone(),
                    source,
                })?;

            // Commit before looking at the next migration: a process
            // killed after this write resumes at the following migration,
            // one killed before it re-runs this one.
            self.store.record_applied(&id.file_name).await?;
            tracing::info!(migration = %id, "migration applied and recorded");

            applied_this_run.push(id.file_name.clone());
        }

        Ok(RunReport {
            applied: applied_this_run,
            already_applied: applied.len(),
            latest_applied,
            execution_time_ms: start.elapsed().as_millis(),
        })
    }

    /// Applied/pending state of every discovered migration, in file-name
    /// order.
    pub async fn status(&self) -> MigrateResult<Vec<MigrationState>> {
        let (candidates, applied) =
            tokio::try_join!(self.source.list_candidates(), self.store.list_applied())?;

        let mut states: Vec<MigrationState> = candidates
            .into_iter()
            .map(|candidate| {
                let applied_at = applied
                    .iter()
                    .find(|record| record.file_name == candidate.file_name)
                    .map(|record| record.applied_at);
                MigrationState {
                    file_name: candidate.file_name,
                    applied_at,
                }
            })
            .collect();

        states.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(states)
    }
}
