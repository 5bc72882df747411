use std::path::Path;

use mongrate_core::{connect, ChangelogStore, Config, MigrationSource, Reconciler};

use crate::migrations;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let database = connect(&config.database).await?;
    let store = ChangelogStore::new(&database, &config.database.changelog_collection);
    let registry = migrations::registry();

    let runner = Reconciler::new(
        MigrationSource::new(&config.migrations_dir),
        &registry,
        &store,
        &database,
    );

    let report = runner.up().await?;

    if report.applied.is_empty() {
        match report.latest_applied {
            Some(latest) => println!("Nothing to apply; changelog is up to date (latest: {latest})"),
            None => println!("Nothing to apply; no migrations recorded yet"),
        }
    } else {
        for file_name in &report.applied {
            println!("Applied: {file_name}");
        }
        println!(
            "Applied {} migration(s) in {}ms",
            report.applied.len(),
            report.execution_time_ms
        );
    }

    Ok(())
}
