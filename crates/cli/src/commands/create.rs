use std::path::Path;

use mongrate_core::{create_migration_file, Config, MigrateError};

pub async fn run(config_path: Option<&Path>, name: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let name = name.ok_or(MigrateError::MissingMigrationName)?;

    let path = create_migration_file(&config.migrations_dir, name)?;

    println!("Created migration: {}", path.display());
    println!("Register it in src/migrations/mod.rs, rebuild, then run `mongrate up`.");
    Ok(())
}
