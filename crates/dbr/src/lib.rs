//! Production-grade Postgres access layer.
//!
//! [`Database`] wires together whichever of the following components this build was compiled
//! with (see the crate's Cargo features — `pool`, `transaction`, `migrate`, `cache`, `router`,
//! `retry`, `slowlog`, or `facade`/`full` for everything):
//!
//! - **Connection pool** (`dbr-pool`): acquire/exec/query/begin plus stats and health checks.
//! - **Transaction manager** (`dbr-transaction`): isolation levels, timeouts, panic safety,
//!   nested savepoints, retry on deadlock/serialization failure.
//! - **Migration runner** (`dbr-migrate`): ordered, transactional schema migrations with a
//!   recorded apply history.
//! - **Query cache** (`dbr-cache`): key/TTL store fronting reads.
//! - **Replica router** (`dbr-router`): writes to primary, reads to a healthy replica.
//! - **Retry & circuit breaker** (`dbr-retry`, `dbr-circuitbreaker`, `dbr-backoff`,
//!   `dbr-classify`): available standalone, or layered over the facade via
//!   [`RetryableDatabase`].
//!
//! # Quick start
//!
//! ```no_run
//! # #[cfg(feature = "facade")]
//! # async fn example() -> Result<(), dbr_core::DbError> {
//! use dbr::{Database, DatabaseConfig};
//! use std::sync::Arc;
//!
//! let config = DatabaseConfig::new("postgres://localhost/app").with_replica("postgres://replica/app");
//! let db = Arc::new(Database::connect(config).await?);
//! let ctx = tokio_util::sync::CancellationToken::new();
//!
//! let background = {
//!     let db = Arc::clone(&db);
//!     let token = ctx.clone();
//!     tokio::spawn(async move { db.run_background_tasks(token).await })
//! };
//!
//! db.exec(&ctx, "CREATE TABLE IF NOT EXISTS widgets (id INT PRIMARY KEY)", &[]).await?;
//! let rows = db.query(&ctx, "SELECT id FROM widgets", &[]).await?;
//! drop(background);
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

mod config;

#[cfg(feature = "pool")]
mod database;

#[cfg(feature = "retry")]
mod retryable;

pub use config::DatabaseConfig;

#[cfg(feature = "pool")]
pub use database::Database;

#[cfg(feature = "retry")]
pub use retryable::RetryableDatabase;

#[cfg(feature = "backoff")]
pub use dbr_backoff as backoff;

#[cfg(feature = "cache")]
pub use dbr_cache as cache;

#[cfg(feature = "circuitbreaker")]
pub use dbr_circuitbreaker as circuitbreaker;

#[cfg(feature = "classify")]
pub use dbr_classify as classify;

#[cfg(feature = "migrate")]
pub use dbr_migrate as migrate;

#[cfg(feature = "pool")]
pub use dbr_pool as pool;

#[cfg(feature = "retry")]
pub use dbr_retry as retry;

#[cfg(feature = "router")]
pub use dbr_router as router;

#[cfg(feature = "slowlog")]
pub use dbr_slowlog as slowlog;

#[cfg(feature = "transaction")]
pub use dbr_transaction as transaction;

pub use dbr_core as core;
