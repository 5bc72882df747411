//! Migration scaffolding
//!
//! Produces a new, timestamp-prefixed migration source file from a fixed
//! template. Scaffolding only ever creates new, uniquely-timestamped
//! files, so it is safe to run while a migration run is in flight.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{MigrateError, MigrateResult};

/// Create a new migration file named `<now>.<slug>.rs` under `dir`.
///
/// Fails with [`MigrateError::MissingMigrationName`] when `name` is empty
/// (or slugs down to nothing), and with [`MigrateError::FileWrite`] when
/// the target exists or cannot be written. Returns the path of the file it
/// created.
pub fn create_migration_file(dir: &Path, name: &str) -> MigrateResult<PathBuf> {
    create_migration_file_at(dir, name, Utc::now())
}

fn create_migration_file_at(
    dir: &Path,
    name: &str,
    now: DateTime<Utc>,
) -> MigrateResult<PathBuf> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(MigrateError::MissingMigrationName);
    }

    fs::create_dir_all(dir).map_err(|source| MigrateError::FileWrite {
        path: dir.to_path_buf(),
        source,
    })?;

    let sort_key = now.format("%Y%m%d_%H%M%S").to_string();
    let file_name = format!("{}.{}.rs", sort_key, slug);
    let path = dir.join(&file_name);

    let body = render_template(&file_name, &slug, name, now);

    // create_new: refuse to clobber an existing migration
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|source| MigrateError::FileWrite {
            path: path.clone(),
            source,
        })?;
    file.write_all(body.as_bytes())
        .map_err(|source| MigrateError::FileWrite {
            path: path.clone(),
            source,
        })?;

    tracing::info!(path = %path.display(), "created migration file");
    Ok(path)
}

/// Lowercase, hyphen-separated form of a migration name.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// `add-user-indexes` -> `AddUserIndexes`
fn struct_name(slug: &str) -> String {
    slug.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn render_template(file_name: &str, slug: &str, name: &str, now: DateTime<Utc>) -> String {
    let type_name = struct_name(slug);
    format!(
        r#"//! Migration: {name}
//! Created: {created}

use anyhow::Result;
use async_trait::async_trait;
use mongodb::Database;
use mongrate_core::MigrationStep;

pub struct {type_name};

#[async_trait]
impl MigrationStep for {type_name} {{
    fn file_name(&self) -> &str {{
        "{file_name}"
    }}

    async fn up(&self, db: &Database) -> Result<()> {{
        let _ = db;
        Ok(())
    }}

    async fn down(&self, db: &Database) -> Result<()> {{
        let _ = db;
        Ok(())
    }}
}}
"#,
        name = name.trim(),
        created = now.format("%Y-%m-%d %H:%M:%S UTC"),
        type_name = type_name,
        file_name = file_name,
    )
}
