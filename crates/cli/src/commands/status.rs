use std::path::Path;

use mongrate_core::{connect, ChangelogStore, Config, MigrationSource, Reconciler};

use crate::migrations;

pub async fn run(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
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

    let states = runner.status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&states)?);
        return Ok(());
    }

    if states.is_empty() {
        println!("No migrations found in {}", config.migrations_dir.display());
        return Ok(());
    }

    for state in &states {
        match &state.applied_at {
            Some(at) => println!(
                "  applied  {}  ({})",
                state.file_name,
                at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => println!("  pending  {}", state.file_name),
        }
    }

    Ok(())
}
