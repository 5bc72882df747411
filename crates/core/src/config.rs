//! Runner configuration
//!
//! Settings come from three layers, later layers winning: built-in
//! defaults, an optional `mongrate.toml`, and `MONGRATE_*` environment
//! variables. The engine itself only ever sees the resolved [`Config`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MigrateError, MigrateResult};

/// Default configuration file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "mongrate.toml";

/// Resolved runner configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Directory holding authored migration files
    pub migrations_dir: PathBuf,
}

/// Connection settings for the target database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    /// Full connection string; set, it takes precedence over host/port
    pub uri: Option<String>,
    /// Database the migrations run against
    pub name: String,
    /// Collection recording applied migrations
    pub changelog_collection: String,
}

impl DatabaseConfig {
    /// Connection string for the driver.
    pub fn connection_uri(&self) -> String {
        match &self.uri {
            Some(uri) => uri.clone(),
            None => format!("mongodb://{}:{}", self.host, self.port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                host: "127.0.0.1".to_string(),
                port: 27017,
                uri: None,
                name: "app".to_string(),
                changelog_collection: "changelog".to_string(),
            },
            migrations_dir: PathBuf::from("migrations"),
        }
    }
}

/// On-disk shape of `mongrate.toml`. All fields optional; anything absent
/// keeps its default.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    database: DatabaseFile,
    #[serde(default)]
    paths: PathsFile,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseFile {
    host: Option<String>,
    port: Option<u16>,
    uri: Option<String>,
    name: Option<String>,
    changelog: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PathsFile {
    migrations_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration: defaults, then `mongrate.toml` (the given path,
    /// or [`CONFIG_FILE`] if it exists), then `MONGRATE_*` environment
    /// variables.
    pub fn load(path: Option<&Path>) -> MigrateResult<Self> {
        let mut config = Config::default();

        let file = match path {
            Some(explicit) => Some(explicit.to_path_buf()),
            None => {
                let default = PathBuf::from(CONFIG_FILE);
                default.exists().then_some(default)
            }
        };

        if let Some(file) = file {
            let raw = std::fs::read_to_string(&file).map_err(|e| MigrateError::Config {
                message: format!("cannot read {}: {}", file.display(), e),
            })?;
            let parsed: ConfigFile = toml::from_str(&raw).map_err(|e| MigrateError::Config {
                message: format!("cannot parse {}: {}", file.display(), e),
            })?;
            config.apply_file(parsed);
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        let db = file.database;
        if let Some(host) = db.host {
            self.database.host = host;
        }
        if let Some(port) = db.port {
            self.database.port = port;
        }
        if db.uri.is_some() {
            self.database.uri = db.uri;
        }
        if let Some(name) = db.name {
            self.database.name = name;
        }
        if let Some(changelog) = db.changelog {
            self.database.changelog_collection = changelog;
        }
        if let Some(dir) = file.paths.migrations_dir {
            self.migrations_dir = dir;
        }
    }

    /// Apply `MONGRATE_*` overrides via the given lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> MigrateResult<()> {
        if let Some(host) = lookup("MONGRATE_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("MONGRATE_PORT") {
            self.database.port = port.parse().map_err(|_| MigrateError::Config {
                message: format!("MONGRATE_PORT is not a port number: '{}'", port),
            })?;
        }
        if let Some(uri) = lookup("MONGRATE_URI") {
            self.database.uri = Some(uri);
        }
        if let Some(name) = lookup("MONGRATE_DATABASE") {
            self.database.name = name;
        }
        if let Some(changelog) = lookup("MONGRATE_CHANGELOG") {
            self.database.changelog_collection = changelog;
        }
        if let Some(dir) = lookup("MONGRATE_MIGRATIONS_DIR") {
            self.migrations_dir = PathBuf::from(dir);
        }
        Ok(())
    }
}
