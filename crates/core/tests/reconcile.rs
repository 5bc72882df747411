//! Engine-level tests for the reconciliation runner.
//!
//! These run against an in-memory changelog store and a compiled-in test
//! registry; the database handle is a lazy driver handle that no test step
//! ever touches, so no server is needed.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mongodb::Database;

use mongrate_core::{
    AppliedMigration, AppliedSet, MigrateError, MigrateResult, MigrationId, MigrationRegistry,
    MigrationSource, MigrationStep, Reconciler, StepLoader,
};

/// Changelog store holding records in memory, with the same duplicate-key
/// behavior the real collection has.
#[derive(Default)]
struct MemoryStore {
    records: Mutex<BTreeMap<String, DateTime<Utc>>>,
    /// Names whose `record_applied` fails as a duplicate even though they
    /// are not listed, simulating a racing runner's insert.
    poisoned: Mutex<Vec<String>>,
}

impl MemoryStore {
    fn with_applied(names: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut records = store.records.lock().unwrap();
            for (i, name) in names.iter().enumerate() {
                let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, i as u32).unwrap();
                records.insert(name.to_string(), at);
            }
        }
        store
    }

    fn poison(&self, name: &str) {
        self.poisoned.lock().unwrap().push(name.to_string());
    }

    fn recorded(&self) -> Vec<String> {
        self.records.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl AppliedSet for MemoryStore {
    async fn list_applied(&self) -> MigrateResult<Vec<AppliedMigration>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|(file_name, applied_at)| AppliedMigration {
                file_name: file_name.clone(),
                applied_at: *applied_at,
            })
            .collect())
    }

    async fn record_applied(&self, file_name: &str) -> MigrateResult<()> {
        if self.poisoned.lock().unwrap().iter().any(|p| p == file_name) {
            return Err(MigrateError::DuplicateRecord {
                file_name: file_name.to_string(),
            });
        }
        let mut records = self.records.lock().unwrap();
        if records.contains_key(file_name) {
            return Err(MigrateError::DuplicateRecord {
                file_name: file_name.to_string(),
            });
        }
        records.insert(file_name.to_string(), Utc::now());
        Ok(())
    }
}

/// Step that appends its file name to a shared execution log.
struct RecordingStep {
    file_name: String,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl MigrationStep for RecordingStep {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    async fn up(&self, _db: &Database) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("step exploded");
        }
        self.log.lock().unwrap().push(self.file_name.clone());
        Ok(())
    }
}

/// Loader that claims to contain everything, so tests can drive the engine
/// into the mid-run load failure path that artifact verification would
/// otherwise catch up front.
struct UncheckedLoader(MigrationRegistry);

impl StepLoader for UncheckedLoader {
    fn contains(&self, _file_name: &str) -> bool {
        true
    }

    fn load(&self, id: &MigrationId) -> MigrateResult<Arc<dyn MigrationStep>> {
        self.0.load(id)
    }
}

fn touch_all(dir: &Path, names: &[&str]) {
    for name in names {
        File::create(dir.join(name)).unwrap();
    }
}

fn registry_for(names: &[&str], log: &Arc<Mutex<Vec<String>>>, failing: &[&str]) -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();
    for name in names {
        registry.register(RecordingStep {
            file_name: name.to_string(),
            log: Arc::clone(log),
            fail: failing.contains(name),
        });
    }
    registry
}

/// Lazy handle; the driver does not connect until an operation runs, and
/// no test step runs one.
async fn idle_database() -> Database {
    mongodb::Client::with_uri_str("mongodb://127.0.0.1:27017")
        .await
        .expect("client options")
        .database("mongrate_engine_tests")
}

const FIRST: &str = "20240101_000000.first.rs";
const SECOND: &str = "20240102_000000.second.rs";
const THIRD: &str = "20240103_000000.third.rs";

#[tokio::test]
async fn applies_exactly_the_pending_set() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[FIRST, SECOND, THIRD]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = registry_for(&[FIRST, SECOND, THIRD], &log, &[]);
    let store = MemoryStore::with_applied(&[FIRST]);
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &registry, &store, &db);
    let report = runner.up().await.unwrap();

    assert_eq!(report.applied, vec![SECOND, THIRD]);
    assert_eq!(report.already_applied, 1);
    assert_eq!(*log.lock().unwrap(), vec![SECOND, THIRD]);
    assert_eq!(store.recorded(), vec![FIRST, SECOND, THIRD]);
}

#[tokio::test]
async fn second_run_applies_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[FIRST, SECOND]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = registry_for(&[FIRST, SECOND], &log, &[]);
    let store = MemoryStore::default();
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &registry, &store, &db);

    let first_run = runner.up().await.unwrap();
    assert_eq!(first_run.applied, vec![FIRST, SECOND]);

    let second_run = runner.up().await.unwrap();
    assert!(second_run.applied.is_empty());
    assert_eq!(second_run.already_applied, 2);
    assert_eq!(second_run.latest_applied.as_deref(), Some(SECOND));
    assert_eq!(*log.lock().unwrap(), vec![FIRST, SECOND]);
}

#[tokio::test]
async fn executes_in_file_name_order() {
    let tmp = tempfile::tempdir().unwrap();
    // created newest-first; execution order must not follow creation order
    touch_all(tmp.path(), &[THIRD, FIRST, SECOND]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = registry_for(&[FIRST, SECOND, THIRD], &log, &[]);
    let store = MemoryStore::default();
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &registry, &store, &db);
    let report = runner.up().await.unwrap();

    assert_eq!(report.applied, vec![FIRST, SECOND, THIRD]);
    assert_eq!(*log.lock().unwrap(), vec![FIRST, SECOND, THIRD]);
}

#[tokio::test]
async fn failing_step_aborts_and_preserves_prior_commits() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[FIRST, SECOND, THIRD]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = registry_for(&[FIRST, SECOND, THIRD], &log, &[SECOND]);
    let store = MemoryStore::default();
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &registry, &store, &db);
    let err = runner.up().await.unwrap_err();

    match err {
        MigrateError::Execution { file_name, .. } => assert_eq!(file_name, SECOND),
        other => panic!("expected Execution, got {:?}", other),
    }
    // first committed; the failing one and everything after are not
    assert_eq!(store.recorded(), vec![FIRST]);
    assert_eq!(*log.lock().unwrap(), vec![FIRST]);
}

#[tokio::test]
async fn fresh_run_resumes_after_failure() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[FIRST, SECOND, THIRD]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let store = MemoryStore::default();
    let db = idle_database().await;
    let source = || MigrationSource::new(tmp.path());

    let broken = registry_for(&[FIRST, SECOND, THIRD], &log, &[SECOND]);
    Reconciler::new(source(), &broken, &store, &db)
        .up()
        .await
        .unwrap_err();

    // simulated restart with the step fixed
    let fixed = registry_for(&[FIRST, SECOND, THIRD], &log, &[]);
    let report = Reconciler::new(source(), &fixed, &store, &db)
        .up()
        .await
        .unwrap();

    assert_eq!(report.applied, vec![SECOND, THIRD]);
    assert_eq!(store.recorded(), vec![FIRST, SECOND, THIRD]);
    assert_eq!(*log.lock().unwrap(), vec![FIRST, SECOND, THIRD]);
}

#[tokio::test]
async fn unregistered_candidate_fails_before_any_execution() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[FIRST, SECOND]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = registry_for(&[FIRST], &log, &[]);
    let store = MemoryStore::default();
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &registry, &store, &db);
    let err = runner.up().await.unwrap_err();

    assert!(matches!(
        err,
        MigrateError::MissingCompiledArtifact { file_name, .. } if file_name == SECOND
    ));
    assert!(log.lock().unwrap().is_empty());
    assert!(store.recorded().is_empty());
}

#[tokio::test]
async fn load_failure_mid_run_aborts_without_continuing() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[FIRST, SECOND, THIRD]);

    let log = Arc::new(Mutex::new(Vec::new()));
    // registry is missing the second step; the unchecked loader hides that
    // from artifact verification so the failure surfaces at load time
    let registry = registry_for(&[FIRST, THIRD], &log, &[]);
    let loader = UncheckedLoader(registry);
    let store = MemoryStore::default();
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &loader, &store, &db);
    let err = runner.up().await.unwrap_err();

    assert!(matches!(
        err,
        MigrateError::NoUpOperation { file_name } if file_name == SECOND
    ));
    assert_eq!(store.recorded(), vec![FIRST]);
    assert_eq!(*log.lock().unwrap(), vec![FIRST]);
}

#[tokio::test]
async fn duplicate_record_during_commit_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[FIRST, SECOND]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = registry_for(&[FIRST, SECOND], &log, &[]);
    let store = MemoryStore::default();
    // not listed as applied, but a concurrent runner wins the insert race
    store.poison(FIRST);
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &registry, &store, &db);
    let err = runner.up().await.unwrap_err();

    assert!(matches!(
        err,
        MigrateError::DuplicateRecord { file_name } if file_name == FIRST
    ));
    // the run stopped: the second migration never executed
    assert_eq!(*log.lock().unwrap(), vec![FIRST]);
    assert!(store.recorded().is_empty());
}

#[tokio::test]
async fn malformed_file_on_disk_fails_discovery() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[FIRST, "foo.rs"]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = registry_for(&[FIRST], &log, &[]);
    let store = MemoryStore::default();
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &registry, &store, &db);
    let err = runner.up().await.unwrap_err();

    assert!(matches!(err, MigrateError::InvalidFilename { file_name } if file_name == "foo.rs"));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_pending_reports_latest_applied() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[FIRST, SECOND]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = registry_for(&[FIRST, SECOND], &log, &[]);
    let store = MemoryStore::with_applied(&[FIRST, SECOND]);
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &registry, &store, &db);
    let report = runner.up().await.unwrap();

    assert!(report.applied.is_empty());
    assert_eq!(report.latest_applied.as_deref(), Some(SECOND));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn status_lists_every_discovered_migration_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    touch_all(tmp.path(), &[SECOND, FIRST, THIRD]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = registry_for(&[FIRST, SECOND, THIRD], &log, &[]);
    let store = MemoryStore::with_applied(&[FIRST]);
    let db = idle_database().await;

    let runner = Reconciler::new(MigrationSource::new(tmp.path()), &registry, &store, &db);
    let states = runner.status().await.unwrap();

    let names: Vec<_> = states.iter().map(|s| s.file_name.as_str()).collect();
    assert_eq!(names, vec![FIRST, SECOND, THIRD]);
    assert!(states[0].applied_at.is_some());
    assert!(states[1].applied_at.is_none());
    assert!(states[2].applied_at.is_none());
}
