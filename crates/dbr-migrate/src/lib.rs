//! Schema migration runner (spec §4.H): loads ordered migrations from a filesystem tree,
//! applies/rolls back each inside its own transaction, and maintains a `schema_migrations`
//! history table.
//!
//! New code — no teacher crate models schema migrations — grounded conceptually on
//! `grove-pg-stream`'s versioned, transactionally-applied stream definitions and on the
//! `schema_migrations`-style bootstrap table used across the corpus's Postgres-backed
//! services.

mod loader;
mod migration;
mod runner;

pub use loader::{load_dir, load_entries};
pub use migration::{Migration, MigrationStatus};
pub use runner::MigrationRunner;
