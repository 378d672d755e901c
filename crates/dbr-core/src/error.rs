//! Cross-cutting error taxonomy (spec §7).
//!
//! Every crate in the workspace surfaces its failures as a [`DbError`], so that a caller at
//! any layer (pool, transaction, migration, router) can match on one [`DbErrorKind`] rather
//! than downcasting through a chain of crate-specific error types.

use std::fmt;

/// The retryability/propagation taxonomy from spec §7.
///
/// This is the tag a caller matches on; it is deliberately coarser than the [`RetryTag`]
/// produced by `dbr-classify`, which additionally distinguishes *why* something is
/// transient (deadlock vs. serialization vs. connection loss).
///
/// [`RetryTag`]: https://docs.rs/dbr-classify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorKind {
    /// Configuration was invalid (bad connection string, out-of-range pool size, ...).
    ConfigInvalid,
    /// The initial connection attempt failed.
    ConnectFailed,
    /// The pool has no connections available and none could be created in time.
    PoolExhausted,
    /// A connection acquire was cancelled before it completed.
    AcquireCanceled,
    /// A query failed for a non-retryable reason.
    QueryFailed,
    /// The server reported a deadlock.
    Deadlock,
    /// The server reported a serialization failure under `SERIALIZABLE` isolation.
    SerializationFailure,
    /// The connection was lost mid-operation.
    ConnectionLost,
    /// The operation exceeded its deadline.
    Timeout,
    /// The circuit breaker rejected the call because it is `Open`.
    CircuitOpen,
    /// A migration referenced a version with no matching SQL file.
    MigrationMissingSql,
    /// A migration's SQL failed to apply.
    MigrationSqlFailed,
    /// A migration's `schema_migrations` row was missing where one was expected.
    MigrationRecordMissing,
    /// A transaction failed to commit.
    CommitFailed,
    /// A transaction failed to roll back (logged, never masks the primary error).
    RollbackFailed,
    /// Anything not covered by the above.
    Unknown,
}

impl DbErrorKind {
    /// Short machine-stable name, used as the `error_type` metrics label and in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            DbErrorKind::ConfigInvalid => "config_invalid",
            DbErrorKind::ConnectFailed => "connect_failed",
            DbErrorKind::PoolExhausted => "pool_exhausted",
            DbErrorKind::AcquireCanceled => "acquire_canceled",
            DbErrorKind::QueryFailed => "query_failed",
            DbErrorKind::Deadlock => "deadlock",
            DbErrorKind::SerializationFailure => "serialization_failure",
            DbErrorKind::ConnectionLost => "connection_lost",
            DbErrorKind::Timeout => "timeout",
            DbErrorKind::CircuitOpen => "circuit_open",
            DbErrorKind::MigrationMissingSql => "migration_missing_sql",
            DbErrorKind::MigrationSqlFailed => "migration_sql_failed",
            DbErrorKind::MigrationRecordMissing => "migration_record_missing",
            DbErrorKind::CommitFailed => "commit_failed",
            DbErrorKind::RollbackFailed => "rollback_failed",
            DbErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The crate-wide error type.
///
/// `DbError` carries a [`DbErrorKind`] classification tag plus the original cause chain (via
/// `#[source]`), so a caller never has to choose between "know what kind of failure this is"
/// and "see the underlying driver error."
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DbError {
    kind: DbErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DbError {
    /// Builds a new error of the given kind with a human-readable message.
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a cause, preserving it in the `std::error::Error` source chain.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The taxonomy tag this error carries.
    pub fn kind(&self) -> DbErrorKind {
        self.kind
    }

    /// Shorthand constructors for the most commonly raised kinds.
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::ConfigInvalid, message)
    }

    pub fn circuit_open(target: impl fmt::Display) -> Self {
        Self::new(
            DbErrorKind::CircuitOpen,
            format!("circuit breaker for {target} is open"),
        )
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::Timeout, message)
    }

    pub fn acquire_canceled() -> Self {
        Self::new(
            DbErrorKind::AcquireCanceled,
            "connection acquire was canceled",
        )
    }
}
