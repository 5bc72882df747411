//! # mongrate-core: migration engine for MongoDB
//!
//! Discovers authored migration files, reconciles them against the
//! changelog collection of a target database, executes the pending ones in
//! chronological order with a durable commit after every step, and
//! scaffolds new migration files.
//!
//! The binary crate (`mongrate`) wires this into a CLI; services can embed
//! the engine directly by building a [`MigrationRegistry`] and handing it
//! to a [`Reconciler`].

pub mod config;
pub mod database;
pub mod error;
pub mod identifier;
pub mod migration;
pub mod runner;
pub mod scaffold;
pub mod source;
pub mod store;

// Re-export core traits and types
pub use config::{Config, DatabaseConfig};
pub use database::connect;
pub use error::{MigrateError, MigrateResult};
pub use identifier::{MigrationId, MIGRATION_EXTENSION};
pub use migration::{MigrationRegistry, MigrationStep, StepLoader};
pub use runner::{MigrationState, Reconciler, RunReport};
pub use scaffold::create_migration_file;
pub use source::MigrationSource;
pub use store::{AppliedMigration, AppliedMigrationRecord, AppliedSet, ChangelogStore};
