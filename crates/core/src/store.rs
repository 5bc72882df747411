//! Applied-set store
//!
//! The changelog is one collection keyed by migration file name. `_id` is
//! the file name itself, so recording the same migration twice (a re-run
//! bug, or two racing runners) fails with
//! [`MigrateError::DuplicateRecord`] instead of double inserting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{bson, Collection, Database};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, MigrateResult};

/// One applied migration, as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub file_name: String,
    pub applied_at: DateTime<Utc>,
}

/// Persisted changelog document. Written exactly once per successful
/// migration, never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedMigrationRecord {
    #[serde(rename = "_id")]
    pub file_name: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub applied_at: DateTime<Utc>,
}

/// Persistence abstraction over the changelog collection.
///
/// The engine only needs two operations; anything implementing them can
/// back a run, which is also how the engine tests run without a server.
#[async_trait]
pub trait AppliedSet: Send + Sync {
    /// All recorded migrations. Order is not guaranteed.
    async fn list_applied(&self) -> MigrateResult<Vec<AppliedMigration>>;

    /// Durably record one migration as applied, stamping the current time.
    async fn record_applied(&self, file_name: &str) -> MigrateResult<()>;
}

/// Changelog store backed by a MongoDB collection.
pub struct ChangelogStore {
    collection: Collection<AppliedMigrationRecord>,
}

impl ChangelogStore {
    /// Bind the store to `collection_name` in the given database. The
    /// collection handle is created once and reused for every call.
    pub fn new(database: &Database, collection_name: &str) -> Self {
        Self {
            collection: database.collection(collection_name),
        }
    }
}

#[async_trait]
impl AppliedSet for ChangelogStore {
    async fn list_applied(&self) -> MigrateResult<Vec<AppliedMigration>> {
        let mut cursor = self.collection.find(bson::doc! {}).await?;
        let mut applied = Vec::new();
        while let Some(record) = cursor.try_next().await? {
            applied.push(AppliedMigration {
                file_name: record.file_name,
                applied_at: record.applied_at,
            });
        }
        Ok(applied)
    }

    async fn record_applied(&self, file_name: &str) -> MigrateResult<()> {
        let record = AppliedMigrationRecord {
            file_name: file_name.to_string(),
            applied_at: Utc::now(),
        };

        self.collection.insert_one(record).await.map_err(|err| {
            if is_duplicate_key(&err) {
                MigrateError::DuplicateRecord {
                    file_name: file_name.to_string(),
                }
            } else {
                MigrateError::Database(err)
            }
        })?;

        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if write_error.code == 11000
    )
}
