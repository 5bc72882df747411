//! Compiled-in migration registry.
//!
//! Authored migration files live in the configured migrations directory
//! (`migrations/` at the repository root by default). Their names contain
//! dots, so each one is wired in with a `#[path]` module declaration plus
//! one `register` call:
//!
//! ```ignore
//! #[path = "../../../../migrations/20240315_104500.add-users.rs"]
//! mod m20240315_104500_add_users;
//!
//! // and inside registry():
//! registry.register(m20240315_104500_add_users::AddUsers);
//! ```
//!
//! `mongrate create` scaffolds the file; the runner refuses to start while
//! an authored file has no registered step, so a forgotten registration
//! fails loudly instead of silently running a stale binary.

use mongrate_core::MigrationRegistry;

/// Every migration compiled into this binary.
pub fn registry() -> MigrationRegistry {
    #[allow(unused_mut)]
    let mut registry = MigrationRegistry::new();
    // Register migrations here, oldest first for readability:
    // registry.register(m20240315_104500_add_users::AddUsers);
    registry
}
